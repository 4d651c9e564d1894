pub mod briefing;
pub mod quote;
pub mod subscriber;
