#[cfg(feature = "logging")]
mod logging;
