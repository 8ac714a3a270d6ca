pub mod decode;
pub mod form_field;
pub mod logging;
pub mod response;
