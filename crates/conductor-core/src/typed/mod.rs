//! Typed - 型付き Task API
//!
//! task_type の typo を型で排除し、Handler との対応付けを静的に保証する。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskKind` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure
//!
//! 解決できない task_type は "general" handler にフォールバックする。

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, FnHandler, Handler, HandlerContext, TypedHandler, handler_fn};
pub use self::registry::{HandlerRegistry, RegistryError};
pub use self::task::{AnalysisTask, GeneralTask, GenerationTask, TaskKind, TestingTask};
