// ============================================
// Fragment Stage - Blinn-Phong + debug режимы
// ============================================
// Финальный цвет фрагмента: albedo * свет с учётом normal mapping,
// затенённости из PCF и фонового слагаемого. Debug-режимы взаимно
// исключающие, приоритет фиксированный.

use ultraviolet::{Vec3, Vec4};

use crate::lighting::{cascade_debug_color, CascadeSet, ShadowAtlas, ShadowMap, SunLight};
use crate::pipeline::vertex::{CascadedVaryings, SingleVaryings};
use crate::uniforms::{FeatureFlags, Material};

/// Нижняя граница shininess одиночного варианта
pub const SHININESS_FLOOR_SINGLE: f32 = 16.0;

/// Нижняя граница shininess CSM-варианта
pub const SHININESS_FLOOR_CASCADED: f32 = 8.0;

/// Фоновое слагаемое одиночного варианта (константа, не uniform)
pub const AMBIENT_SINGLE: f32 = 0.1;

/// Показатель Blinn-Phong из шероховатости
///
/// Линейная интерполяция к floor: гладкая поверхность (roughness 0)
/// даёт 128, шершавая (roughness 1) - floor варианта.
pub fn shininess(roughness: f32, floor: f32) -> f32 {
    (1.0 - roughness) * (128.0 - floor) + floor
}

/// Диффузное слагаемое, отрицательные углы срезаются в 0
pub fn diffuse_term(sun_dir: Vec3, normal: Vec3) -> f32 {
    sun_dir.dot(normal).max(0.0)
}

/// Зеркальное слагаемое Blinn-Phong через halfway-вектор
pub fn specular_term(sun_dir: Vec3, view_dir: Vec3, normal: Vec3, shininess: f32) -> f32 {
    let halfway = (sun_dir + view_dir).normalized();
    normal.dot(halfway).max(0.0).powf(shininess)
}

/// Раскодировать normal map: каналы [0,1] -> [-1,1]
///
/// flip_y компенсирует перевёрнутое начало координат текстуры
/// (нужен одиночному варианту, CSM-вариант читает как есть).
pub fn decode_normal(sample: Vec4, flip_y: bool) -> Vec3 {
    let mut n = Vec3::new(sample.x * 2.0 - 1.0, sample.y * 2.0 - 1.0, sample.z * 2.0 - 1.0);
    if flip_y {
        n.y = -n.y;
    }
    n
}

/// Итоговая формула: свет * ((spec + diff) * видимость + ambient) * albedo
fn combine(sun_color: Vec3, specular: f32, diffuse: f32, occlusion: f32, ambient: f32, albedo: Vec3) -> Vec3 {
    sun_color * ((specular + diffuse) * (1.0 - occlusion) + ambient) * albedo
}

fn encode_normal_color(normal: Vec3) -> Vec4 {
    let c = normal * 0.5 + Vec3::new(0.5, 0.5, 0.5);
    Vec4::new(c.x, c.y, c.z, 1.0)
}

/// Фрагментная стадия CSM-варианта
///
/// Векторы освещения пришли в касательном пространстве и после
/// интерполяции перенормируются.
pub fn shade_cascaded(
    varyings: &CascadedVaryings,
    material: &Material<'_>,
    sun: &SunLight,
    cascades: &CascadeSet,
    atlas: &ShadowAtlas,
    flags: &FeatureFlags,
) -> Vec4 {
    // Нормаль в касательном пространстве: из карты или геометрическая
    let normal = if flags.complex_normals {
        decode_normal(material.normal.sample(varyings.uv), false).normalized()
    } else {
        Vec3::unit_z()
    };

    // Высший приоритет, до любых теневых выборок
    if flags.visualize_normals {
        return encode_normal_color(normal);
    }

    let count = cascades.count();
    let hit = cascades.select(varyings.view_depth, &varyings.shadow_positions[..count]);
    let occlusion = match hit {
        Some(h) => atlas.occlusion(h.coord, h.index),
        None => 0.0,
    };

    let sun_dir = varyings.sun_dir_tangent.normalized();
    let diffuse = diffuse_term(sun_dir, normal);

    if flags.visualize_cascades {
        // У каскадов 4-5 и у "вне каскадов" цвет не назначен: зона
        // остаётся нулевой, виден один ambient
        let zone = hit
            .and_then(|h| cascade_debug_color(h.index))
            .unwrap_or(Vec3::zero());
        let c = zone * (diffuse * (1.0 - occlusion)) + Vec3::new(sun.ambient, sun.ambient, sun.ambient);
        return Vec4::new(c.x, c.y, c.z, 1.0);
    }

    if flags.visualize_shadowed {
        return Vec4::new(occlusion, occlusion, occlusion, 1.0);
    }

    let albedo = material.albedo.sample(varyings.uv);
    let roughness = material.roughness.sample(varyings.uv).x;
    let view_dir = (varyings.view_pos_tangent - varyings.position_tangent).normalized();
    let specular = specular_term(
        sun_dir,
        view_dir,
        normal,
        shininess(roughness, SHININESS_FLOOR_CASCADED),
    );

    let c = combine(
        sun.color,
        specular,
        diffuse,
        occlusion,
        sun.ambient,
        Vec3::new(albedo.x, albedo.y, albedo.z),
    );
    Vec4::new(c.x, c.y, c.z, 1.0)
}

/// Фрагментная стадия одиночного варианта
///
/// Освещение в мировых координатах, смена базиса нормали происходит
/// здесь: интерполированный TBN честнее предумноженных векторов.
pub fn shade_single(
    varyings: &SingleVaryings,
    material: &Material<'_>,
    sun: &SunLight,
    view_position: Vec3,
    shadow_map: &ShadowMap,
    flags: &FeatureFlags,
) -> Vec4 {
    // Транспонированный TBN переводит ИЗ касательного пространства,
    // его третий столбец - мировая нормаль базиса
    let from_tangent = varyings.tbn.transposed();
    let normal = if flags.complex_normals {
        // Этот вариант дополнительно переворачивает Y канала
        let n = decode_normal(material.normal.sample(varyings.uv), true);
        (from_tangent * n).normalized()
    } else {
        from_tangent.cols[2].normalized()
    };

    // Единственный debug-режим одиночного варианта
    if flags.visualize_normals {
        return encode_normal_color(normal);
    }

    // Та же проверка границ, что делает выбор каскада в CSM-варианте,
    // только встроенная: вне frustum'а света тени нет
    let sp = varyings.shadow_position;
    let shadow_coord = Vec3::new(sp.x / sp.w, sp.y / sp.w, sp.z / sp.w) * 0.5
        + Vec3::new(0.5, 0.5, 0.5);
    let occlusion = shadow_map.occlusion(shadow_coord);

    let albedo = material.albedo.sample(varyings.uv);
    let roughness = material.roughness.sample(varyings.uv).x;
    let diffuse = diffuse_term(sun.direction, normal);
    let view_dir = (view_position - varyings.world_position).normalized();
    let specular = specular_term(
        sun.direction,
        view_dir,
        normal,
        shininess(roughness, SHININESS_FLOOR_SINGLE),
    );

    let c = combine(
        sun.color,
        specular,
        diffuse,
        occlusion,
        AMBIENT_SINGLE,
        Vec3::new(albedo.x, albedo.y, albedo.z),
    );
    Vec4::new(c.x, c.y, c.z, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::{CascadeSet, ShadowAtlas, ShadowMap};
    use crate::texture::{DepthMap, Texture};
    use crate::uniforms::FeatureFlags;
    use approx::assert_relative_eq;
    use ultraviolet::{Mat3, Mat4, Vec2};

    fn white_material() -> (Texture, Texture, Texture) {
        (
            Texture::solid(Vec4::new(1.0, 1.0, 1.0, 1.0)),
            // Нейтральная normal map: (0,0,1) в кодировке [0,1]
            Texture::solid(Vec4::new(0.5, 0.5, 1.0, 1.0)),
            // roughness 0.5 в красном канале
            Texture::solid(Vec4::new(0.5, 0.0, 0.0, 1.0)),
        )
    }

    fn test_varyings() -> CascadedVaryings {
        let mut shadow_positions = [Vec4::zero(); crate::lighting::MAX_CASCADES];
        shadow_positions[0] = Vec4::new(0.0, 0.0, 0.0, 1.0);
        CascadedVaryings {
            sun_dir_tangent: Vec3::unit_z(),
            view_pos_tangent: Vec3::unit_z() * 5.0,
            position_tangent: Vec3::zero(),
            shadow_positions,
            world_position: Vec3::zero(),
            uv: Vec2::new(0.5, 0.5),
            view_depth: 5.0,
        }
    }

    fn lit_atlas() -> ShadowAtlas {
        ShadowAtlas::new(DepthMap::constant(8, 8, 1.0), 1)
    }

    fn one_cascade() -> CascadeSet {
        CascadeSet::new(vec![10.0], vec![Mat4::identity()]).unwrap()
    }

    #[test]
    fn test_diffuse_clamped_to_zero_for_backfacing() {
        let n = Vec3::unit_z();
        assert_eq!(diffuse_term(Vec3::unit_z(), n), 1.0);
        assert_eq!(diffuse_term(-Vec3::unit_z(), n), 0.0);
        assert_eq!(diffuse_term(Vec3::unit_x(), n), 0.0);

        let grazing = Vec3::new(1.0, 0.0, 1.0).normalized();
        let d = diffuse_term(grazing, n);
        assert!(d > 0.0 && d <= 1.0);
    }

    #[test]
    fn test_shininess_monotone_and_bounded() {
        for floor in [SHININESS_FLOOR_SINGLE, SHININESS_FLOOR_CASCADED] {
            let mut prev = f32::INFINITY;
            for i in 0..=10 {
                let r = i as f32 / 10.0;
                let s = shininess(r, floor);
                assert!(s <= prev, "shininess must not grow with roughness");
                assert!(s >= floor && s <= 128.0);
                prev = s;
            }
            assert_relative_eq!(shininess(0.0, floor), 128.0);
            assert_relative_eq!(shininess(1.0, floor), floor);
        }
    }

    #[test]
    fn test_closed_form_blinn_phong() {
        // albedo белый, roughness 0.5, свет вдоль нормали, тени нет,
        // ambient 0: halfway совпадает с нормалью, specular = 1,
        // diffuse = 1 => цвет ровно (2,2,2)
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::new(Vec3::unit_z(), Vec3::new(1.0, 1.0, 1.0), 0.0);

        let color = shade_cascaded(
            &test_varyings(),
            &material,
            &sun,
            &one_cascade(),
            &lit_atlas(),
            &FeatureFlags::default(),
        );
        assert_relative_eq!(color.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(color.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(color.z, 2.0, epsilon = 1e-5);
        assert_eq!(color.w, 1.0);
    }

    #[test]
    fn test_occlusion_suppresses_direct_light_only() {
        // Атлас весь ближе фрагмента: полная тень, остаётся ambient
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::new(Vec3::unit_z(), Vec3::new(1.0, 1.0, 1.0), 0.25);

        let mut varyings = test_varyings();
        varyings.shadow_positions[0] = Vec4::new(0.0, 0.0, 0.8, 1.0); // глубина 0.9
        let atlas = ShadowAtlas::new(DepthMap::constant(8, 8, 0.1), 1);

        let color = shade_cascaded(
            &varyings,
            &material,
            &sun,
            &one_cascade(),
            &atlas,
            &FeatureFlags::default(),
        );
        assert_relative_eq!(color.x, 0.25, epsilon = 1e-5);
    }

    #[test]
    fn test_visualize_normals_wins_over_shadowed() {
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::default();

        let flags = FeatureFlags {
            visualize_normals: true,
            visualize_shadowed: true,
            ..Default::default()
        };
        let color = shade_cascaded(
            &test_varyings(),
            &material,
            &sun,
            &one_cascade(),
            &lit_atlas(),
            &flags,
        );
        // Кодировка нормали (0,0,1), а не серая затенённость
        assert_relative_eq!(color.x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(color.y, 0.5, epsilon = 1e-6);
        assert_relative_eq!(color.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_visualize_shadowed_returns_grayscale_occlusion() {
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::default();

        let mut varyings = test_varyings();
        varyings.shadow_positions[0] = Vec4::new(0.0, 0.0, 0.8, 1.0);
        let atlas = ShadowAtlas::new(DepthMap::constant(8, 8, 0.1), 1);

        let flags = FeatureFlags { visualize_shadowed: true, ..Default::default() };
        let color = shade_cascaded(&varyings, &material, &sun, &one_cascade(), &atlas, &flags);
        assert_relative_eq!(color.x, 1.0);
        assert_relative_eq!(color.y, color.x);
        assert_relative_eq!(color.z, color.x);
    }

    #[test]
    fn test_visualize_cascade_zone_colors() {
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::new(Vec3::unit_z(), Vec3::new(1.0, 1.0, 1.0), 0.0);
        let flags = FeatureFlags { visualize_cascades: true, ..Default::default() };

        // Каскад 0, без тени, diffuse 1: чистый красный
        let color = shade_cascaded(
            &test_varyings(),
            &material,
            &sun,
            &one_cascade(),
            &lit_atlas(),
            &flags,
        );
        assert_relative_eq!(color.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(color.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(color.z, 0.0, epsilon = 1e-6);

        // Вне всех каскадов: зона без цвета, остаётся только ambient (0)
        let mut far = test_varyings();
        far.view_depth = 100.0;
        let color = shade_cascaded(&far, &material, &sun, &one_cascade(), &lit_atlas(), &flags);
        assert_relative_eq!(color.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_visualize_cascade_zone_dims_with_occlusion() {
        // Цвет зоны гасится затенённостью: diffuse * (1 - occlusion)
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::new(Vec3::unit_z(), Vec3::new(1.0, 1.0, 1.0), 0.0);
        let flags = FeatureFlags { visualize_cascades: true, ..Default::default() };

        // 3 текселя PCF-ядра закрывают фрагмент -> occlusion 3/9
        let mut depth = DepthMap::constant(8, 8, 1.0);
        for x in 3..6 {
            depth.set(x, 3, 0.1);
        }
        let atlas = ShadowAtlas::new(depth, 1);

        let mut varyings = test_varyings();
        varyings.shadow_positions[0] = Vec4::new(0.125, 0.125, 0.8, 1.0); // coord (0.5625, 0.5625, 0.9)

        let color = shade_cascaded(&varyings, &material, &sun, &one_cascade(), &atlas, &flags);
        // Красный каскада 0 на 1 * (1 - 3/9)
        assert_relative_eq!(color.x, 2.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(color.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_normal_flip_y() {
        let sample = Vec4::new(0.5, 0.75, 1.0, 1.0);
        let plain = decode_normal(sample, false);
        let flipped = decode_normal(sample, true);
        assert_relative_eq!(plain.y, 0.5, epsilon = 1e-6);
        assert_relative_eq!(flipped.y, -0.5, epsilon = 1e-6);
        assert_relative_eq!(plain.x, flipped.x);
        assert_relative_eq!(plain.z, flipped.z);
    }

    #[test]
    fn test_single_variant_ambient_constant_and_floor() {
        // Полная тень: у одиночного варианта остаётся константный 0.1
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::new(Vec3::unit_z(), Vec3::new(1.0, 1.0, 1.0), 0.9);

        let varyings = SingleVaryings {
            tbn: Mat3::identity(),
            world_position: Vec3::zero(),
            shadow_position: Vec4::new(0.0, 0.0, 0.8, 1.0),
            uv: Vec2::new(0.5, 0.5),
        };
        let map = ShadowMap::new(DepthMap::constant(8, 8, 0.1));
        let color = shade_single(
            &varyings,
            &material,
            &sun,
            Vec3::unit_z() * 5.0,
            &map,
            &FeatureFlags::default(),
        );
        // sun.ambient = 0.9 игнорируется, берётся константа 0.1
        assert_relative_eq!(color.x, AMBIENT_SINGLE, epsilon = 1e-5);
    }

    #[test]
    fn test_single_out_of_frustum_is_lit() {
        let (albedo, normal, roughness) = white_material();
        let material = Material::new(&albedo, &normal, &roughness);
        let sun = SunLight::new(Vec3::unit_z(), Vec3::new(1.0, 1.0, 1.0), 0.0);

        // Shadow-координата за пределами [0,1] по X: тень принудительно 0,
        // хотя карта вся "закрывает"
        let varyings = SingleVaryings {
            tbn: Mat3::identity(),
            world_position: Vec3::zero(),
            shadow_position: Vec4::new(2.0, 0.0, 0.8, 1.0),
            uv: Vec2::new(0.5, 0.5),
        };
        let map = ShadowMap::new(DepthMap::constant(8, 8, 0.0));
        let color = shade_single(
            &varyings,
            &material,
            &sun,
            Vec3::unit_z() * 5.0,
            &map,
            &FeatureFlags::default(),
        );
        // (diffuse 1 + specular 1) * 1.0 + ambient 0.1 = 2.1
        assert_relative_eq!(color.x, 2.0 + AMBIENT_SINGLE, epsilon = 1e-5);
    }
}
