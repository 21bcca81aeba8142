mod alarm;
mod delete;
mod relocate;
mod retry;
