// ============================================
// Sunlit - Стадия освещения forward-рендера
// ============================================
// Программная (CPU) реализация шейдинга:
// - Normal mapping в касательном пространстве
// - Blinn-Phong освещение от одного солнца
// - Тени: одиночная shadow map или CSM-атлас с PCF фильтрацией
// - Debug-визуализации (нормали, тень, зоны каскадов)

pub mod config;
pub mod lighting;
pub mod pipeline;
pub mod texture;
pub mod uniforms;

// Реэкспорт основных типов
pub use config::RenderSettings;
pub use lighting::{CascadeSet, ShadowAtlas, ShadowMap, SunLight};
pub use pipeline::{CascadedPipeline, ShadingPipeline, SingleMapPipeline, Vertex};
pub use texture::{DepthMap, Texture};
pub use uniforms::{DrawUniforms, FeatureFlags, FrameUniforms, Material};
