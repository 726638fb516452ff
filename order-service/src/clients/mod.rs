pub mod database;
pub mod health;
pub mod mail;
pub mod rbmq;
