//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（LanguageModel、Repository）
//! - context: 生成前的小说上下文组装
//! - generators: 各内容家族的生成器
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod context;
pub mod error;
pub mod generators;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    // Novel commands
    AddChapter,
    AddCharacter,
    AddPlotPoint,
    CreateNovel,
    // Storyline commands
    CreateNodeConnection,
    CreateStoryNode,
    CreateStoryline,
    DeleteNodeConnection,
    DeleteStoryNode,
    DeleteStoryline,
    PersistGeneratedStorylines,
    UpdateStoryNode,
    UpdateStoryline,
    // Handlers
    handlers::{
        AddChapterHandler, AddCharacterHandler, AddPlotPointHandler, CreateNodeConnectionHandler,
        CreateNovelHandler, CreateStoryNodeHandler, CreateStorylineHandler,
        DeleteNodeConnectionHandler, DeleteStoryNodeHandler, DeleteStorylineHandler,
        PersistGeneratedStorylinesHandler, PersistedStoryline, UpdateStoryNodeHandler,
        UpdateStorylineHandler,
    },
};

pub use context::ContextAssembler;
pub use error::ApplicationError;

pub use generators::{
    AnalyzeStyleRequest, ChapterDraft, ChapterGenerator, ChapterRequest, CharacterGenerator,
    CharacterProfile, CharacterRequest, ChatGenerator, ChatRequest, GenerationPipeline,
    GenerationStage, GeneratorSettings, GoalGenerator, GoalRequest, NovelMeta, PlotGenerator,
    PlotRequest, PlotSuggestion, PolishRequest, RefineCharacterRequest, SettingGenerator,
    SettingRequest, SettingResponse, StorylineGenerator, StorylineRequest, StyleGenerator,
    StyleGuide, StyleRequest, SummarizeRequest, WritingGoals,
};

pub use ports::{
    // Language model
    complete_with_callback,
    segment_channel,
    ChatMessage,
    CompletionOptions,
    CompletionStream,
    LanguageModelPort,
    LlmError,
    Role,
    SegmentSender,
    // Repositories
    ChapterRecord,
    CharacterRecord,
    NovelRecord,
    NovelRepositoryPort,
    PlotPointRecord,
    RepositoryError,
    StorylineRepositoryPort,
};

pub use queries::{
    // Novel queries
    GetNovel,
    // Storyline queries
    GetStoryline,
    GetStorylineGraph,
    ListStorylines,
    // Handlers
    handlers::{
        GetNovelHandler, GetStorylineGraphHandler, GetStorylineHandler, ListStorylinesHandler,
        NovelOverviewResponse, StorylineGraphResponse,
    },
};
