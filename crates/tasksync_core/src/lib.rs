pub mod domain;
pub mod notify;
pub mod ordering;
pub mod ports;
pub mod service;

pub use domain::{
    Category, CategoryDraft, NewTask, Task, TaskAccess, TaskChanges, TaskEvent, TaskRole, User,
    UserCredentials,
};
pub use notify::{DeliveryReport, Dispatcher};
pub use ports::{NotificationService, PortError, PortResult, TaskStore, UserStore};
pub use service::TaskService;
