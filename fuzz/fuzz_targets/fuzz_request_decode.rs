#![no_main]

use libfuzzer_sys::fuzz_target;
use todo_service::http::{CreateTodoRequest, UpdateTodoRequest};
use todo_service::validation::{ensure_patch, ensure_title};

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = serde_json::from_slice::<CreateTodoRequest>(data) {
        if let Ok((title, _)) = request.validate() {
            assert_eq!(title, title.trim());
            assert!(ensure_title(&title).is_ok());
        }
    }

    if let Ok(request) = serde_json::from_slice::<UpdateTodoRequest>(data) {
        if let Ok(patch) = request.into_patch() {
            assert!(!patch.is_empty());
            assert!(ensure_patch(&patch).is_ok());
        }
    }
});
