use crate::logging::{init, Mode};

#[test]
fn test_init() {
	init("info", Mode::Default).expect("failed to init logger");
	// The second call only reloads the filter.
	init("debug,hyper=warn", Mode::Json).expect("failed to reload logger");
}

#[test]
fn test_with_bad_input() {
	assert!(init("chat_sync=notalevel", Mode::Default).is_err());
}
