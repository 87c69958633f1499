use rayon::prelude::*;

/// Depth range the projection maps view depth into.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DepthConvention {
    /// Depth buffer holds [0, 1] directly (wgpu, Vulkan, D3D).
    #[default]
    ZeroToOne,
    /// Depth buffer value `d` stands for NDC z `2d - 1` in [-1, 1] (OpenGL).
    NegOneToOne,
}

/// View-space distance for a depth buffer value `d` in [0, 1].
pub fn linearize_depth(d: f32, near: f32, far: f32, convention: DepthConvention) -> f32 {
    match convention {
        DepthConvention::ZeroToOne => near * far / (far - d * (far - near)),
        DepthConvention::NegOneToOne => {
            let z = d * 2.0 - 1.0;
            2.0 * near * far / (far + near - z * (far - near))
        }
    }
}

/// Inverse of [`linearize_depth`].
pub fn depth_from_view(view_depth: f32, near: f32, far: f32, convention: DepthConvention) -> f32 {
    match convention {
        DepthConvention::ZeroToOne => far * (view_depth - near) / (view_depth * (far - near)),
        DepthConvention::NegOneToOne => {
            let z = (far + near - 2.0 * near * far / view_depth) / (far - near);
            (z + 1.0) * 0.5
        }
    }
}

/// How linear depth is squeezed into the single channel linear depth surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LinearDepthEncoding {
    pub max: f32,
}

impl LinearDepthEncoding {
    pub fn encode(&self, view_depth: f32) -> f32 {
        (view_depth / self.max).clamp(0.0, 1.0)
    }

    pub fn decode(&self, stored: f32) -> f32 {
        stored * self.max
    }
}

/// Parameters of the depth resolve pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DepthResolve {
    pub near: f32,
    pub far: f32,
    pub convention: DepthConvention,
    pub encoding: LinearDepthEncoding,
}

impl DepthResolve {
    pub fn resolve_texel(&self, d: f32) -> f32 {
        self.encoding
            .encode(linearize_depth(d, self.near, self.far, self.convention))
    }

    /// Linearizes a whole depth image into `out`, one value per pixel.
    pub fn resolve(&self, depth: &[f32], out: &mut [f32]) {
        debug_assert_eq!(depth.len(), out.len());
        out.par_iter_mut()
            .zip(depth.par_iter())
            .for_each(|(dst, d)| *dst = self.resolve_texel(*d));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NEAR: f32 = 0.1;
    const FAR: f32 = 1000.0;

    #[test]
    fn endpoints_map_to_near_and_far() {
        for convention in [DepthConvention::ZeroToOne, DepthConvention::NegOneToOne] {
            assert_relative_eq!(linearize_depth(0.0, NEAR, FAR, convention), NEAR, max_relative = 1e-5);
            assert_relative_eq!(linearize_depth(1.0, NEAR, FAR, convention), FAR, max_relative = 1e-3);
        }
    }

    #[test]
    fn linearization_inverts_projection() {
        for convention in [DepthConvention::ZeroToOne, DepthConvention::NegOneToOne] {
            for view_depth in [0.2f32, 1.0, 7.5, 40.0] {
                let d = depth_from_view(view_depth, NEAR, FAR, convention);
                assert!((0.0..=1.0).contains(&d));
                assert_relative_eq!(
                    linearize_depth(d, NEAR, FAR, convention),
                    view_depth,
                    max_relative = 1e-3
                );
            }
        }
    }

    #[test]
    fn zero_to_one_matches_perspective_matrix() {
        let proj = glam::Mat4::perspective_rh(1.0, 1.5, NEAR, FAR);
        let clip = proj * glam::Vec4::new(0.0, 0.0, -12.0, 1.0);
        let d = clip.z / clip.w;
        assert_relative_eq!(
            linearize_depth(d, NEAR, FAR, DepthConvention::ZeroToOne),
            12.0,
            max_relative = 1e-3
        );
    }

    #[test]
    fn encoding_clamps_and_scales() {
        let encoding = LinearDepthEncoding { max: 1000.0 };
        assert_eq!(encoding.encode(500.0), 0.5);
        assert_eq!(encoding.encode(2000.0), 1.0);
        assert_eq!(encoding.encode(-1.0), 0.0);
        assert_relative_eq!(encoding.decode(encoding.encode(42.0)), 42.0, max_relative = 1e-6);
    }

    #[test]
    fn resolve_fills_every_texel() {
        let resolve = DepthResolve {
            near: NEAR,
            far: FAR,
            convention: DepthConvention::ZeroToOne,
            encoding: LinearDepthEncoding { max: FAR },
        };
        let depth = vec![0.0, 0.5, 0.99, 1.0];
        let mut out = vec![-1.0; 4];
        resolve.resolve(&depth, &mut out);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }
}
