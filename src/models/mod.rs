//! Domain models

pub mod title;
pub mod user;

pub use title::{Exemplar, ExemplarState, HistoryEntry, Review, StatusCounts, Title};
pub use user::{CreateUser, Loan, Reservation, Subscription, User, UserClaims, UserView};
