pub mod connect;
pub mod login;
pub mod logout;
pub mod send;
