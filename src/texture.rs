// ============================================
// Texture - CPU текстуры для сэмплирования
// ============================================
// Материальные карты (albedo, normal, roughness) и карты глубины.
// Загрузка и генерация мипов - забота хоста, здесь только выборка.

use ultraviolet::{Vec2, Vec4};

/// Ошибки создания текстур
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// Размер буфера не совпадает с width * height
    SizeMismatch { expected: usize, got: usize },
    /// Байтовый буфер не конвертируется в тексели (длина/выравнивание)
    BadByteBuffer(String),
    /// Нулевая ширина или высота
    ZeroDimension,
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::SizeMismatch { expected, got } => {
                write!(f, "texture buffer size mismatch: expected {} texels, got {}", expected, got)
            }
            TextureError::BadByteBuffer(why) => write!(f, "bad byte buffer: {}", why),
            TextureError::ZeroDimension => write!(f, "texture dimensions must be non-zero"),
        }
    }
}

impl std::error::Error for TextureError {}

/// Цветная текстура RGBA (f32 на канал)
///
/// Адресация как у GPU-сэмплера с Repeat: UV за пределами [0,1]
/// заворачиваются. Фильтрация - nearest.
#[derive(Clone, Debug)]
pub struct Texture {
    texels: Vec<Vec4>,
    width: usize,
    height: usize,
}

impl Texture {
    pub fn new(width: usize, height: usize, texels: Vec<Vec4>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroDimension);
        }
        if texels.len() != width * height {
            return Err(TextureError::SizeMismatch {
                expected: width * height,
                got: texels.len(),
            });
        }
        Ok(Self { texels, width, height })
    }

    /// Текстура из сырого RGBA8 буфера (как после загрузки изображения)
    pub fn from_rgba8(width: usize, height: usize, data: &[u8]) -> Result<Self, TextureError> {
        let pixels: &[[u8; 4]] = bytemuck::try_cast_slice(data)
            .map_err(|e| TextureError::BadByteBuffer(e.to_string()))?;
        if pixels.len() != width * height {
            return Err(TextureError::SizeMismatch {
                expected: width * height,
                got: pixels.len(),
            });
        }
        let texels = pixels
            .iter()
            .map(|p| {
                Vec4::new(
                    p[0] as f32 / 255.0,
                    p[1] as f32 / 255.0,
                    p[2] as f32 / 255.0,
                    p[3] as f32 / 255.0,
                )
            })
            .collect();
        Ok(Self { texels, width, height })
    }

    /// Одноцветная текстура 1x1 (заглушки в тестах и демо)
    pub fn solid(color: Vec4) -> Self {
        Self { texels: vec![color], width: 1, height: 1 }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Выборка nearest с Repeat-заворачиванием UV
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * self.width as f32) as usize).min(self.width - 1);
        let y = ((v * self.height as f32) as usize).min(self.height - 1);
        self.texels[y * self.width + x]
    }
}

/// Карта глубины (shadow map или CSM-атлас)
///
/// Один f32 на тексель. Адресация с ClampToEdge: выборка за краем
/// возвращает крайний тексель, без заворачивания.
#[derive(Clone, Debug)]
pub struct DepthMap {
    depth: Vec<f32>,
    width: usize,
    height: usize,
}

impl DepthMap {
    pub fn new(width: usize, height: usize, depth: Vec<f32>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroDimension);
        }
        if depth.len() != width * height {
            return Err(TextureError::SizeMismatch {
                expected: width * height,
                got: depth.len(),
            });
        }
        Ok(Self { depth, width, height })
    }

    /// Карта из сырых байтов (little-endian f32, как из readback буфера)
    pub fn from_bytes(width: usize, height: usize, data: &[u8]) -> Result<Self, TextureError> {
        let depth: &[f32] = bytemuck::try_cast_slice(data)
            .map_err(|e| TextureError::BadByteBuffer(e.to_string()))?;
        Self::new(width, height, depth.to_vec())
    }

    /// Карта с постоянной глубиной (синтетические тени в демо/тестах)
    pub fn constant(width: usize, height: usize, value: f32) -> Self {
        Self { depth: vec![value; width * height], width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Размер текселя в UV координатах
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    /// Прямая запись глубины (хост заполняет карту до прохода шейдинга)
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        if x < self.width && y < self.height {
            self.depth[y * self.width + x] = value;
        }
    }

    /// Выборка nearest с clamp к краю
    pub fn sample(&self, uv: Vec2) -> f32 {
        let x = (uv.x * self.width as f32).floor().clamp(0.0, (self.width - 1) as f32) as usize;
        let y = (uv.y * self.height as f32).floor().clamp(0.0, (self.height - 1) as f32) as usize;
        self.depth[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_size_validation() {
        let err = Texture::new(4, 4, vec![Vec4::zero(); 15]).unwrap_err();
        assert_eq!(err, TextureError::SizeMismatch { expected: 16, got: 15 });

        assert!(Texture::new(0, 4, vec![]).is_err());
        assert!(Texture::new(4, 4, vec![Vec4::zero(); 16]).is_ok());
    }

    #[test]
    fn test_rgba8_decode() {
        let data = [255u8, 0, 127, 255];
        let tex = Texture::from_rgba8(1, 1, &data).unwrap();
        let c = tex.sample(Vec2::new(0.5, 0.5));
        assert_eq!(c.x, 1.0);
        assert_eq!(c.y, 0.0);
        assert!((c.z - 127.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeat_wrapping() {
        // 2x1: левый тексель красный, правый зелёный
        let tex = Texture::new(
            2,
            1,
            vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 1.0)],
        )
        .unwrap();
        let a = tex.sample(Vec2::new(0.25, 0.5));
        let b = tex.sample(Vec2::new(1.25, 0.5)); // завернулось в тот же тексель
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_depth_clamp_to_edge() {
        let mut map = DepthMap::constant(4, 4, 1.0);
        map.set(0, 0, 0.25);
        // Выборка левее края возвращает крайний тексель
        assert_eq!(map.sample(Vec2::new(-0.5, 0.0)), 0.25);
        assert_eq!(map.sample(Vec2::new(0.0, -0.5)), 0.25);
    }
}
