pub mod network;
pub mod payment;
pub mod quote;
pub mod response;

pub use network::*;
pub use payment::*;
pub use quote::*;
pub use response::*;
