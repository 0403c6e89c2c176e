//! modelry core - entity metamodel, predicate builder, template renderer and CRUD engine.
//!
//! Entity types are declared once in a [`ModelRegistry`]; the [`Engine`] then offers
//! generic filtering, rendering, interactive collection and create/edit/delete for every
//! registered type, over any [`Store`].

pub mod catalog;
pub mod collect;
pub mod config;
pub mod engine;
pub mod error;
pub mod instance;
pub mod query;
pub mod render;
pub mod storage;
pub mod table;
pub mod translate;
pub mod value;

pub use catalog::{
    Attribute, AttributeOption, DefaultValue, EntityDef, FieldDef, Model, ModelRegistry, Presentation,
    RelationDef, ScalarType, TranslateValues,
};
pub use collect::{Answer, Choice, NoPrompt, Prompt, PromptType, Question, ScriptedPrompt};
pub use config::EngineConfig;
pub use engine::{Engine, InstanceCache};
pub use error::{Error, Result};
pub use instance::{Instance, InstanceHandle};
pub use query::{Criteria, FilterValue, Predicate, Query};
pub use render::{RenderCachePolicy, Renderer};
pub use storage::{MemoryStore, Session, SqliteStore, Store};
pub use table::TableData;
pub use translate::{CatalogTranslator, IdentityTranslator, Translator};
pub use value::Value;
