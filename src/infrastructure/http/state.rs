//! Application State
//!
//! 包含所有生成器与 Command/Query Handlers 的应用状态

use std::sync::Arc;
use std::time::Duration;

use crate::application::{
    // Generators
    ChapterGenerator, CharacterGenerator, ChatGenerator, ContextAssembler, GeneratorSettings,
    GoalGenerator, PlotGenerator, SettingGenerator, StorylineGenerator, StyleGenerator,
    // Command handlers
    AddChapterHandler, AddCharacterHandler, AddPlotPointHandler, CreateNodeConnectionHandler,
    CreateNovelHandler, CreateStoryNodeHandler, CreateStorylineHandler,
    DeleteNodeConnectionHandler, DeleteStoryNodeHandler, DeleteStorylineHandler,
    PersistGeneratedStorylinesHandler, UpdateStoryNodeHandler, UpdateStorylineHandler,
    // Query handlers
    GetNovelHandler, GetStorylineGraphHandler, GetStorylineHandler, ListStorylinesHandler,
    // Ports
    LanguageModelPort, NovelRepositoryPort, StorylineRepositoryPort,
};

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub llm: Arc<dyn LanguageModelPort>,

    /// 流式请求的整体截止时间
    pub stream_timeout: Duration,

    // ========== Generators ==========
    pub character_generator: CharacterGenerator,
    pub plot_generator: PlotGenerator,
    pub chapter_generator: ChapterGenerator,
    pub storyline_generator: StorylineGenerator,
    pub setting_generator: SettingGenerator,
    pub style_generator: StyleGenerator,
    pub goal_generator: GoalGenerator,
    pub chat_generator: ChatGenerator,

    // ========== Command Handlers ==========
    pub create_novel_handler: CreateNovelHandler,
    pub add_character_handler: AddCharacterHandler,
    pub add_plot_point_handler: AddPlotPointHandler,
    pub add_chapter_handler: AddChapterHandler,
    pub persist_storylines_handler: PersistGeneratedStorylinesHandler,
    pub create_storyline_handler: CreateStorylineHandler,
    pub update_storyline_handler: UpdateStorylineHandler,
    pub delete_storyline_handler: DeleteStorylineHandler,
    pub create_node_handler: CreateStoryNodeHandler,
    pub update_node_handler: UpdateStoryNodeHandler,
    pub delete_node_handler: DeleteStoryNodeHandler,
    pub create_connection_handler: CreateNodeConnectionHandler,
    pub delete_connection_handler: DeleteNodeConnectionHandler,

    // ========== Query Handlers ==========
    pub get_novel_handler: GetNovelHandler,
    pub get_storyline_handler: GetStorylineHandler,
    pub list_storylines_handler: ListStorylinesHandler,
    pub get_storyline_graph_handler: GetStorylineGraphHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        novel_repo: Arc<dyn NovelRepositoryPort>,
        storyline_repo: Arc<dyn StorylineRepositoryPort>,
        settings: GeneratorSettings,
    ) -> Self {
        let context = Arc::new(ContextAssembler::new(novel_repo.clone()));

        Self {
            // Ports
            llm: llm.clone(),
            stream_timeout: settings.timeout,

            // Generators
            character_generator: CharacterGenerator::new(
                llm.clone(),
                settings.clone(),
                context.clone(),
            ),
            plot_generator: PlotGenerator::new(llm.clone(), settings.clone(), context.clone()),
            chapter_generator: ChapterGenerator::new(llm.clone(), settings.clone(), context.clone()),
            storyline_generator: StorylineGenerator::new(
                llm.clone(),
                settings.clone(),
                context.clone(),
            ),
            setting_generator: SettingGenerator::new(llm.clone(), settings.clone(), context.clone()),
            style_generator: StyleGenerator::new(llm.clone(), settings.clone()),
            goal_generator: GoalGenerator::new(llm.clone(), settings.clone()),
            chat_generator: ChatGenerator::new(llm.clone(), settings, context),

            // Command handlers
            create_novel_handler: CreateNovelHandler::new(novel_repo.clone()),
            add_character_handler: AddCharacterHandler::new(novel_repo.clone()),
            add_plot_point_handler: AddPlotPointHandler::new(novel_repo.clone()),
            add_chapter_handler: AddChapterHandler::new(novel_repo.clone()),
            persist_storylines_handler: PersistGeneratedStorylinesHandler::new(
                storyline_repo.clone(),
            ),
            create_storyline_handler: CreateStorylineHandler::new(storyline_repo.clone()),
            update_storyline_handler: UpdateStorylineHandler::new(storyline_repo.clone()),
            delete_storyline_handler: DeleteStorylineHandler::new(storyline_repo.clone()),
            create_node_handler: CreateStoryNodeHandler::new(storyline_repo.clone()),
            update_node_handler: UpdateStoryNodeHandler::new(storyline_repo.clone()),
            delete_node_handler: DeleteStoryNodeHandler::new(storyline_repo.clone()),
            create_connection_handler: CreateNodeConnectionHandler::new(storyline_repo.clone()),
            delete_connection_handler: DeleteNodeConnectionHandler::new(storyline_repo.clone()),

            // Query handlers
            get_novel_handler: GetNovelHandler::new(novel_repo),
            get_storyline_handler: GetStorylineHandler::new(storyline_repo.clone()),
            list_storylines_handler: ListStorylinesHandler::new(storyline_repo.clone()),
            get_storyline_graph_handler: GetStorylineGraphHandler::new(storyline_repo),
        }
    }
}
