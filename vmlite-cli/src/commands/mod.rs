pub mod completion;
pub mod create;
pub mod edit;
pub mod list;
pub mod run;
pub mod stop;
