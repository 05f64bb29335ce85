mod event;
mod payment;
mod promo_code;
mod ticket;
mod ticket_type;
mod user;
mod waitlist;

pub use event::*;
pub use payment::*;
pub use promo_code::*;
pub use ticket::*;
pub use ticket_type::*;
pub use user::*;
pub use waitlist::*;
