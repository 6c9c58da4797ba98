pub mod claims;
pub mod installation;
pub mod openid;
pub mod representations;
pub mod token;

pub use claims::*;
pub use installation::*;
pub use openid::*;
pub use representations::*;
pub use token::*;
