// ============================================
// Lighting Module - Солнце, каскады, тени
// ============================================
// Один направленный источник (солнце), выбор каскада по глубине,
// PCF выборка затенённости из shadow map / CSM-атласа

mod cascade;
mod light;
mod shadow;

pub use cascade::{cascade_debug_color, CascadeError, CascadeHit, CascadeSet, MAX_CASCADES};
pub use light::SunLight;
pub use shadow::{ShadowAtlas, ShadowMap, PCF_RADIUS, SHADOW_BIAS_CASCADED, SHADOW_BIAS_SINGLE};
