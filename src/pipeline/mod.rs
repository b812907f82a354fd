// ============================================
// Pipeline Module - Два варианта шейдинга
// ============================================
// Одиночная shadow map и CSM - две реализации одного интерфейса,
// вариант выбирается конфигурацией, а не дублированием вызовов.

pub mod executor;
pub mod fragment;
pub mod vertex;

pub use executor::{Framebuffer, run_vertex_stage, run_vertex_stage_instanced};
pub use fragment::{
    decode_normal, diffuse_term, shininess, specular_term, AMBIENT_SINGLE,
    SHININESS_FLOOR_CASCADED, SHININESS_FLOOR_SINGLE,
};
pub use vertex::{CascadedVaryings, Interpolate, SingleVaryings, Vertex, VertexOutput};

use ultraviolet::{Mat4, Vec4};

use crate::lighting::{CascadeSet, ShadowAtlas, ShadowMap};
use crate::uniforms::{DrawUniforms, FrameUniforms, Material};

/// Интерфейс варианта шейдинга
///
/// transform работает на вершину, shade на фрагмент; оба чистые
/// функции от неизменяемых входов - инварианты массового
/// параллелизма держатся на этом.
pub trait ShadingPipeline: Sync {
    type Varyings: Interpolate + Send + Sync;

    /// Вершинная стадия; model приходит отдельно ради инстансной
    /// отрисовки (на каждый инстанс своя матрица)
    fn transform(
        &self,
        vertex: &Vertex,
        model: &Mat4,
        draw: &DrawUniforms,
    ) -> VertexOutput<Self::Varyings>;

    /// Фрагментная стадия: один непрозрачный цвет, без побочных эффектов
    fn shade(&self, varyings: &Self::Varyings, material: &Material<'_>, draw: &DrawUniforms)
        -> Vec4;
}

/// Вариант с одной shadow map
pub struct SingleMapPipeline {
    pub frame: FrameUniforms,
    pub shadow_matrix: Mat4,
    pub shadow_map: ShadowMap,
}

impl SingleMapPipeline {
    pub fn new(frame: FrameUniforms, shadow_matrix: Mat4, shadow_map: ShadowMap) -> Self {
        Self { frame, shadow_matrix, shadow_map }
    }
}

impl ShadingPipeline for SingleMapPipeline {
    type Varyings = SingleVaryings;

    fn transform(
        &self,
        vertex: &Vertex,
        model: &Mat4,
        draw: &DrawUniforms,
    ) -> VertexOutput<SingleVaryings> {
        vertex::transform_single(vertex, model, &self.shadow_matrix, &self.frame, draw)
    }

    fn shade(&self, varyings: &SingleVaryings, material: &Material<'_>, draw: &DrawUniforms) -> Vec4 {
        fragment::shade_single(
            varyings,
            material,
            &self.frame.sun,
            self.frame.view_position,
            &self.shadow_map,
            &draw.flags,
        )
    }
}

/// Вариант с каскадными тенями
pub struct CascadedPipeline {
    pub frame: FrameUniforms,
    pub cascades: CascadeSet,
    pub atlas: ShadowAtlas,
}

impl CascadedPipeline {
    pub fn new(frame: FrameUniforms, cascades: CascadeSet, atlas: ShadowAtlas) -> Self {
        Self { frame, cascades, atlas }
    }
}

impl ShadingPipeline for CascadedPipeline {
    type Varyings = CascadedVaryings;

    fn transform(
        &self,
        vertex: &Vertex,
        model: &Mat4,
        draw: &DrawUniforms,
    ) -> VertexOutput<CascadedVaryings> {
        vertex::transform_cascaded(vertex, model, &self.frame, &self.cascades, draw)
    }

    fn shade(
        &self,
        varyings: &CascadedVaryings,
        material: &Material<'_>,
        draw: &DrawUniforms,
    ) -> Vec4 {
        fragment::shade_cascaded(
            varyings,
            material,
            &self.frame.sun,
            &self.cascades,
            &self.atlas,
            &draw.flags,
        )
    }
}
