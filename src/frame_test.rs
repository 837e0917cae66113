use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("realtime:subscribe", Data::new());
    assert_eq!(frame.syscall, "realtime:subscribe");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn done_with_correlates_to_request() {
    let req = Frame::request("dashboard:get", Data::new());
    let mut data = Data::new();
    data.insert("clients".into(), serde_json::json!(3));
    let done = req.done_with(data);

    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.syscall, "dashboard:get");
    assert_eq!(done.status, Status::Done);
    assert_eq!(done.data.get("clients"), Some(&serde_json::json!(3)));
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("change:insert", Data::new());
    assert_eq!(frame.prefix(), "change");
    assert_eq!(frame.op(), "insert");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn missing_data_deserializes_as_empty() {
    let id = Uuid::new_v4();
    let json = format!(r#"{{"id":"{id}","parent_id":null,"ts":1,"from":null,"syscall":"dashboard:get","status":"request"}}"#);
    let frame: Frame = serde_json::from_str(&json).expect("frame without data should parse");
    assert!(frame.data.is_empty());
    assert_eq!(frame.id, id);
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("feed unavailable")]
    struct Unavailable;

    impl ErrorCode for Unavailable {
        fn error_code(&self) -> &'static str {
            "E_FEED_UNAVAILABLE"
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    let req = Frame::request("realtime:subscribe", Data::new());
    let err = req.error_from(&Unavailable);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get(FRAME_CODE).and_then(|v| v.as_str()), Some("E_FEED_UNAVAILABLE"));
    assert_eq!(err.data.get(FRAME_MESSAGE).and_then(|v| v.as_str()), Some("feed unavailable"));
    assert_eq!(err.data.get(FRAME_RETRYABLE).and_then(serde_json::Value::as_bool), Some(true));
}
