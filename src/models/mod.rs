mod package;
mod payment;
mod session;
mod voucher;

pub use package::*;
pub use payment::*;
pub use session::*;
pub use voucher::*;
