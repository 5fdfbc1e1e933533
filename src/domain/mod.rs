pub mod charge;
pub mod student;
pub mod notification;
pub mod webhook;

pub use charge::*;
pub use student::*;
pub use notification::*;
pub use webhook::*;
