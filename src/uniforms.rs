// ============================================
// Uniforms - Параметры кадра и draw call'а
// ============================================
// Неизменяемая конфигурация на время отрисовки:
// покадровые параметры хост выставляет один раз,
// параметры draw call'а - на каждый объект.

use ultraviolet::{Mat4, Vec2, Vec3};

use crate::lighting::SunLight;
use crate::texture::Texture;

/// Булевы переключатели draw call'а
///
/// Зеркало флагов исходных шейдерных программ: чтение только на
/// фрагментной стадии, никакого изменяемого состояния.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureFlags {
    /// Брать нормаль из normal map вместо геометрической
    pub complex_normals: bool,
    /// Debug: вывести нормаль как цвет (normal * 0.5 + 0.5)
    pub visualize_normals: bool,
    /// Debug: вывести затенённость серым
    pub visualize_shadowed: bool,
    /// Debug: подкрасить зоны каскадов
    pub visualize_cascades: bool,
    /// Инстансная отрисовка (матрица модели на каждый инстанс)
    pub instanced: bool,
}

/// Покадровые параметры
///
/// Теневые ресурсы кадра (shadow-матрицы, дистанции каскадов,
/// depth-карты) привязаны к варианту пайплайна и живут в
/// SingleMapPipeline/CascadedPipeline, а не здесь: у вариантов
/// они разной формы.
#[derive(Clone, Copy, Debug)]
pub struct FrameUniforms {
    pub view_projection: Mat4,
    /// Позиция камеры в мировых координатах
    pub view_position: Vec3,
    pub sun: SunLight,
}

impl FrameUniforms {
    pub fn new() -> Self {
        Self {
            view_projection: Mat4::identity(),
            view_position: Vec3::zero(),
            sun: SunLight::default(),
        }
    }
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::new()
    }
}

/// Параметры одного draw call'а
#[derive(Clone, Copy, Debug)]
pub struct DrawUniforms {
    pub model: Mat4,
    /// Готовое model-view-projection (одиночный вариант считает на хосте)
    pub mvp: Mat4,
    /// Тайлинг UV
    pub uv_scale: Vec2,
    pub uv_offset: Vec2,
    pub flags: FeatureFlags,
}

impl DrawUniforms {
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            mvp: Mat4::identity(),
            uv_scale: Vec2::new(1.0, 1.0),
            uv_offset: Vec2::zero(),
            flags: FeatureFlags::default(),
        }
    }

    pub fn with_mvp(mut self, mvp: Mat4) -> Self {
        self.mvp = mvp;
        self
    }

    pub fn with_uv_scale(mut self, scale: f32) -> Self {
        self.uv_scale = Vec2::new(scale, scale);
        self
    }

    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Привязки материальных карт draw call'а
///
/// Текстуры принадлежат хосту, стадия шейдинга их только читает.
/// Порядок привязок: albedo, normal, roughness.
#[derive(Clone, Copy)]
pub struct Material<'a> {
    /// Базовый цвет
    pub albedo: &'a Texture,
    /// Normal map в касательном пространстве, XY в [0,1] кодируют [-1,1]
    pub normal: &'a Texture,
    /// Шероховатость в красном канале
    pub roughness: &'a Texture,
}

impl<'a> Material<'a> {
    pub fn new(albedo: &'a Texture, normal: &'a Texture, roughness: &'a Texture) -> Self {
        Self { albedo, normal, roughness }
    }
}
