// ============================================
// Shadow Sampler - PCF выборка затенённости
// ============================================
// Квадратное ядро 3x3 вокруг спроецированной точки, сравнение
// глубин с постоянным bias. Затенённость - доля закрытых выборок.

use ultraviolet::{Vec2, Vec3};

use crate::texture::DepthMap;

/// Радиус PCF ядра в текселях (3x3 = 9 выборок)
pub const PCF_RADIUS: i32 = 1;

/// Bias сравнения глубин для CSM-атласа
pub const SHADOW_BIAS_CASCADED: f32 = 0.0025;

/// Bias сравнения глубин для одиночной shadow map
pub const SHADOW_BIAS_SINGLE: f32 = 0.001;

/// PCF по ядру вокруг UV: доля выборок, закрывших фрагмент
///
/// Размер текселя берётся из размеров карты, так что ядро
/// автоматически масштабируется с разрешением.
fn pcf_occlusion(map: &DepthMap, uv: Vec2, fragment_depth: f32, bias: f32) -> f32 {
    let texel = map.texel_size();
    let mut occluded = 0.0_f32;

    for dy in -PCF_RADIUS..=PCF_RADIUS {
        for dx in -PCF_RADIUS..=PCF_RADIUS {
            let tap = uv + Vec2::new(dx as f32 * texel.x, dy as f32 * texel.y);
            if map.sample(tap) + bias < fragment_depth {
                occluded += 1.0;
            }
        }
    }

    let taps = (2 * PCF_RADIUS + 1) * (2 * PCF_RADIUS + 1);
    occluded / taps as f32
}

/// Одиночная shadow map
#[derive(Clone, Debug)]
pub struct ShadowMap {
    depth: DepthMap,
    bias: f32,
}

impl ShadowMap {
    pub fn new(depth: DepthMap) -> Self {
        Self { depth, bias: SHADOW_BIAS_SINGLE }
    }

    pub fn depth_map(&self) -> &DepthMap {
        &self.depth
    }

    /// Затенённость для shadow-координаты, уже приведённой к [0,1]
    ///
    /// Координата вне [0,1] по любой оси означает фрагмент вне
    /// frustum'а света: не ошибка, а "не в тени" (0), чтобы не ловить
    /// артефакты заворачивания по краям.
    pub fn occlusion(&self, coord: Vec3) -> f32 {
        if !in_bounds(coord) {
            return 0.0;
        }
        pcf_occlusion(&self.depth, Vec2::new(coord.x, coord.y), coord.z, self.bias)
    }
}

/// CSM-атлас: каскады упакованы бок о бок вдоль U
///
/// Каждый каскад занимает горизонтальную полосу шириной
/// 1/cascade_count. Проверка границ куба - забота выбора каскада,
/// сюда координата приходит уже провалидированной.
#[derive(Clone, Debug)]
pub struct ShadowAtlas {
    depth: DepthMap,
    cascade_count: usize,
    bias: f32,
}

impl ShadowAtlas {
    pub fn new(depth: DepthMap, cascade_count: usize) -> Self {
        Self { depth, cascade_count, bias: SHADOW_BIAS_CASCADED }
    }

    pub fn depth_map(&self) -> &DepthMap {
        &self.depth
    }

    pub fn cascade_count(&self) -> usize {
        self.cascade_count
    }

    /// Изменяемый доступ для хоста, заполняющего атлас глубинами
    pub fn depth_map_mut(&mut self) -> &mut DepthMap {
        &mut self.depth
    }

    /// Затенённость в полосе каскада
    pub fn occlusion(&self, coord: Vec3, cascade_index: usize) -> f32 {
        let uv = Vec2::new(
            (coord.x + cascade_index as f32) / self.cascade_count as f32,
            coord.y,
        );
        pcf_occlusion(&self.depth, uv, coord.z, self.bias)
    }
}

fn in_bounds(c: Vec3) -> bool {
    (0.0..=1.0).contains(&c.x) && (0.0..=1.0).contains(&c.y) && (0.0..=1.0).contains(&c.z)
}
