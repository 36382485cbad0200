use common::{color::Rgb, config::SliceConfig, image::SliceImage};
use nalgebra::{Matrix3, Matrix4, Vector2};
use ordered_float::OrderedFloat;
use rayon::{
    iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

use crate::{mesh::Mesh, plane::Plane, Pos};

/// Upper bound on the number of row bands triangles are sorted into.
const ROW_BANDS: usize = 256;

/// Renders cross sections of a mesh. Every pixel is classified by casting a
/// ray along the plane normal through its center and summing +1 for every
/// front facing and -1 for every back facing triangle it passes behind the
/// plane. A non zero sum means the pixel is inside the solid.
pub struct Rasterizer {
    mesh: Mesh,
    plane: Plane,
    resolution: Vector2<u32>,
    size: Vector2<f32>,
    color: Rgb<f32>,
}

/// Side information collected while rendering.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RasterStats {
    /// Number of sample planes blended into the image.
    pub samples: u32,
    /// Pixels, summed over every sample, whose ray through the whole mesh
    /// did not return to zero. Only open or inconsistently wound meshes
    /// produce these.
    pub open_pixels: u64,
}

/// A triangle moved into pixel space for one plane offset.
struct Facet {
    /// The whole triangle, used to find open rays.
    full: [Vector2<f32>; 3],
    /// The part of the triangle behind the plane (local z <= 0).
    clipped: Polygon,
    /// +1 when the triangle faces the viewer, -1 when it faces away.
    facing: i32,
    min_y: f32,
    max_y: f32,
}

/// Result of clipping a triangle against a plane, at most four points.
struct Polygon {
    points: [Vector2<f32>; 4],
    len: usize,
}

/// Indices of the facets that could cross each group of rows.
struct RowBands {
    rows_per_band: usize,
    bands: Vec<Vec<u32>>,
}

impl Rasterizer {
    pub fn new(mesh: Mesh, plane: Plane, config: &SliceConfig) -> Self {
        Self {
            mesh,
            plane,
            resolution: config.platform_resolution,
            size: config.platform_size,
            color: config.slice_color.to_unit(),
        }
    }

    pub fn resolution(&self) -> Vector2<u32> {
        self.resolution
    }

    /// Renders the mesh at every offset in `offsets` and blends the results.
    pub fn render(&self, offsets: &[f32]) -> SliceImage {
        self.render_with_stats(offsets).0
    }

    pub fn render_with_stats(&self, offsets: &[f32]) -> (SliceImage, RasterStats) {
        let (width, height) = (self.resolution.x, self.resolution.y);
        let mut hits = vec![0_u32; width as usize * height as usize];
        let mut stats = RasterStats {
            samples: offsets.len() as u32,
            open_pixels: 0,
        };

        for &offset in offsets {
            stats.open_pixels += self.accumulate(offset, &mut hits);
        }

        let image = SliceImage::from_hits(width, height, &hits, stats.samples, self.color);
        (image, stats)
    }

    /// Adds one to the hit count of every pixel inside the mesh at `offset`
    /// and returns the number of open rays.
    fn accumulate(&self, offset: f32, hits: &mut [u32]) -> u64 {
        let (width, height) = (self.resolution.x as usize, self.resolution.y as usize);
        if self.mesh.is_empty() || width == 0 || height == 0 {
            return 0;
        }

        let view = self.plane.view(offset) * self.mesh.transformation_matrix();
        let Some(normal_matrix) = normal_matrix(&view) else {
            return 0;
        };

        let facets = self.prepare(&view, &normal_matrix);
        let bands = RowBands::new(&facets, height);

        // Every row is independent, so each one gets its own list of
        // crossings that is then swept from left to right keeping track of
        // the winding depth.
        hits.par_chunks_mut(width)
            .enumerate()
            .map(|(y, row)| {
                let center = y as f32 + 0.5;
                let mut inner = Vec::new();
                let mut outer = Vec::new();

                for &idx in bands.row(y) {
                    let facet = &facets[idx as usize];
                    if let Some((start, end)) = row_span(facet.clipped.points(), center) {
                        inner.push((start, facet.facing));
                        inner.push((end, -facet.facing));
                    }

                    if let Some((start, end)) = row_span(&facet.full, center) {
                        outer.push((start, facet.facing));
                        outer.push((end, -facet.facing));
                    }
                }

                sweep(&mut inner, row.len(), |x| row[x] += 1);

                let mut open = 0_u64;
                sweep(&mut outer, row.len(), |_| open += 1);
                open
            })
            .sum()
    }

    /// Moves every triangle into pixel space. Pixel (0, 0) is at plane local
    /// (-X/2, -Y/2) and z stays the signed distance from the plane.
    fn prepare(&self, view: &Matrix4<f32>, normal_matrix: &Matrix3<f32>) -> Vec<Facet> {
        let scale = self.resolution.map(|x| x as f32).component_div(&self.size);
        let half = self.size / 2.0;

        self.mesh
            .triangles()
            .par_iter()
            .filter_map(|triangle| {
                // Triangles seen edge on never cover a pixel center, and
                // their facing is meaningless anyway.
                let normal = normal_matrix * triangle.normal();
                if normal.z == 0.0 || !normal.z.is_finite() {
                    return None;
                }

                let points = triangle.vertices.map(|vertex| {
                    let local = view.transform_point(&vertex.into());
                    Pos::new(
                        (local.x + half.x) * scale.x,
                        (local.y + half.y) * scale.y,
                        local.z,
                    )
                });

                let full = points.map(|p| p.xy());
                let (min_y, max_y) = full
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(min, max), p| (min.min(p.y), max.max(p.y)));

                Some(Facet {
                    full,
                    clipped: clip_behind(&points),
                    facing: if normal.z > 0.0 { 1 } else { -1 },
                    min_y,
                    max_y,
                })
            })
            .collect()
    }
}

impl RowBands {
    fn new(facets: &[Facet], height: usize) -> Self {
        let band_count = height.clamp(1, ROW_BANDS);
        let rows_per_band = height.div_ceil(band_count);
        let mut bands = vec![Vec::new(); band_count];

        for (idx, facet) in facets.iter().enumerate() {
            let first = (facet.min_y - 0.5).ceil().max(0.0);
            let last = (facet.max_y - 0.5).floor().min(height as f32 - 1.0);
            if !(first <= last) {
                continue;
            }

            let (first, last) = (first as usize / rows_per_band, last as usize / rows_per_band);
            for band in &mut bands[first..=last] {
                band.push(idx as u32);
            }
        }

        Self {
            rows_per_band,
            bands,
        }
    }

    fn row(&self, y: usize) -> &[u32] {
        &self.bands[y / self.rows_per_band]
    }
}

/// Inverse transpose of the linear part of `view`, used to carry normals
/// into plane local space.
fn normal_matrix(view: &Matrix4<f32>) -> Option<Matrix3<f32>> {
    let linear = view.fixed_view::<3, 3>(0, 0).into_owned();
    linear.try_inverse().map(|x| x.transpose())
}

/// Keeps the part of a triangle on or behind the plane z = 0.
fn clip_behind(points: &[Pos; 3]) -> Polygon {
    let mut out = Polygon::new();
    for i in 0..3 {
        let (a, b) = (points[i], points[(i + 1) % 3]);
        let (a_behind, b_behind) = (a.z <= 0.0, b.z <= 0.0);

        if a_behind {
            out.push(a.xy());
        }

        if a_behind != b_behind {
            out.push(plane_crossing(a, b));
        }
    }

    out
}

/// Where the edge between `a` and `b` crosses z = 0. The endpoints are put
/// in a fixed order first so a shared edge gives the same point from both
/// of its triangles.
fn plane_crossing(a: Pos, b: Pos) -> Vector2<f32> {
    let (a, b) = if a.z < b.z { (a, b) } else { (b, a) };
    let t = a.z / (a.z - b.z);
    (a + (b - a) * t).xy()
}

/// Horizontal extent of a convex polygon along the line y = `y`. Edges
/// count as crossing when exactly one endpoint is above the line, so a
/// center lying on a shared vertex is claimed by one side only.
fn row_span(points: &[Vector2<f32>], y: f32) -> Option<(f32, f32)> {
    let mut span: Option<(f32, f32)> = None;
    for i in 0..points.len() {
        let (a, b) = (points[i], points[(i + 1) % points.len()]);
        if (a.y > y) == (b.y > y) {
            continue;
        }

        let (a, b) = if (a.y, a.x) < (b.y, b.x) { (a, b) } else { (b, a) };
        let x = a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x);
        span = Some(match span {
            Some((min, max)) => (min.min(x), max.max(x)),
            None => (x, x),
        });
    }

    span.filter(|(min, max)| min < max)
}

/// Walks the sorted crossings of one row and calls `inside` for every pixel
/// whose center sits at a non zero winding depth. Spans are half open, a
/// center exactly on a crossing belongs to the span on its right.
fn sweep(crossings: &mut [(f32, i32)], width: usize, mut inside: impl FnMut(usize)) {
    crossings.sort_by_key(|&(x, _)| OrderedFloat(x));

    let mut depth = 0;
    let mut cursor = 0;
    for &(x, delta) in crossings.iter() {
        let end = ((x - 0.5).ceil().max(0.0) as usize).min(width);
        if depth != 0 {
            (cursor..end).for_each(&mut inside);
        }

        cursor = cursor.max(end);
        depth += delta;
    }

    if depth != 0 {
        (cursor..width).for_each(&mut inside);
    }
}

impl Polygon {
    fn new() -> Self {
        Self {
            points: [Vector2::zeros(); 4],
            len: 0,
        }
    }

    fn points(&self) -> &[Vector2<f32>] {
        &self.points[..self.len]
    }

    fn push(&mut self, point: Vector2<f32>) {
        self.points[self.len] = point;
        self.len += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_4, FRAC_PI_6};

    use proptest::prelude::*;

    use super::*;
    use crate::builder::MeshBuilder;

    fn config(resolution: u32, size: f32) -> SliceConfig {
        SliceConfig {
            platform_resolution: Vector2::repeat(resolution),
            platform_size: Vector2::repeat(size),
            ..Default::default()
        }
    }

    /// A cube of the given size centered over the origin resting on z = 0.
    fn cube(size: f32) -> Mesh {
        let half = size / 2.0;
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::new(-half, -half, 0.0), Pos::new(half, half, size));
        builder.build()
    }

    #[test]
    fn cube_inside_and_outside() {
        let rasterizer = Rasterizer::new(cube(10.0), Plane::default(), &config(64, 20.0));

        for offset in [0.5, 3.0, 9.9] {
            let (image, stats) = rasterizer.render_with_stats(&[offset]);
            assert_eq!(stats.open_pixels, 0);
            assert_eq!(
                image.lit_bounds(),
                Some((Vector2::repeat(16), Vector2::repeat(47))),
                "offset {offset}"
            );
            assert_eq!(image.lit_pixels(), 32 * 32);
            assert_eq!(image.pixel(30, 30), Rgb::repeat(1.0));
        }

        for offset in [-0.5, 10.5, 100.0] {
            assert!(rasterizer.render(&[offset]).is_empty(), "offset {offset}");
        }
    }

    #[test]
    fn rotated_cube_cross_section() {
        // Rotated 45 degrees about Z, the square becomes a diamond.
        let mut mesh = cube(10.0);
        mesh.set_rotation(Pos::new(0.0, 0.0, FRAC_PI_4));
        let rasterizer = Rasterizer::new(mesh, Plane::default(), &config(200, 20.0));

        let image = rasterizer.render(&[5.0]);
        // 100 mm² at 10 pixels per mm
        let expected = 100.0 * 100.0;
        let lit = image.lit_pixels() as f32;
        assert!((lit - expected).abs() / expected < 0.02, "{lit} vs {expected}");
        assert!(image.is_lit(100, 100));
        assert!(!image.is_lit(30, 30));
    }

    #[test]
    fn nested_shells_stay_filled() {
        // Two overlapping cubes: the overlap has a depth of two and must not
        // turn into a hole.
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::new(-5.0, -5.0, 0.0), Pos::new(2.0, 2.0, 10.0));
        builder.add_cuboid(Pos::new(-2.0, -2.0, 0.0), Pos::new(5.0, 5.0, 10.0));
        let rasterizer = Rasterizer::new(builder.build(), Plane::default(), &config(20, 20.0));

        let image = rasterizer.render(&[5.0]);
        assert!(image.is_lit(10, 10));
        assert_eq!(image.lit_pixels(), 2 * 49 - 16);
    }

    #[test]
    fn empty_mesh_is_blank() {
        let rasterizer = Rasterizer::new(Mesh::default(), Plane::default(), &config(16, 10.0));
        let (image, stats) = rasterizer.render_with_stats(&[0.0, 1.0]);
        assert!(image.is_empty());
        assert_eq!(image.size(), Vector2::repeat(16));
        assert_eq!(stats.open_pixels, 0);
    }

    #[test]
    fn open_mesh_reports_open_rays() {
        // Without its bottom the cube leaks along every ray through it.
        let triangles = cube(10.0).triangles()[2..].to_vec();
        let rasterizer = Rasterizer::new(Mesh::new(triangles), Plane::default(), &config(64, 20.0));

        let (_, stats) = rasterizer.render_with_stats(&[5.0]);
        assert_eq!(stats.open_pixels, 32 * 32);
    }

    #[test]
    fn tilted_plane_cuts_at_an_angle() {
        let plane = Plane::new(FRAC_PI_6);
        let rasterizer = Rasterizer::new(cube(10.0), plane, &config(64, 20.0));

        // Through the middle of the cube the plane cuts every column, and
        // the cut is stretched along y by 1 / cos.
        let image = rasterizer.render(&[5.0]);
        let (min, max) = image.lit_bounds().unwrap();
        assert_eq!((min.x, max.x), (16, 47));

        let rows = (max.y - min.y + 1) as f32;
        let expected = 32.0 / FRAC_PI_6.cos();
        assert!((rows - expected).abs() <= 2.0, "{rows} vs {expected}");
    }

    #[test]
    fn slice_color_is_applied() {
        let config = SliceConfig {
            slice_color: Rgb::new(255, 0, 51),
            ..config(16, 20.0)
        };
        let rasterizer = Rasterizer::new(cube(10.0), Plane::default(), &config);
        let image = rasterizer.render(&[5.0]);
        assert_eq!(image.pixel(8, 8), Rgb::new(1.0, 0.0, 0.2));
    }

    #[test]
    fn sweep_is_half_open() {
        let mut lit = Vec::new();
        sweep(&mut [(3.5, -1), (1.5, 1)], 8, |x| lit.push(x));
        assert_eq!(lit, vec![1, 2]);

        let mut lit = Vec::new();
        sweep(&mut [(-4.0, 1), (100.0, -1)], 4, |x| lit.push(x));
        assert_eq!(lit, vec![0, 1, 2, 3]);
    }

    #[test]
    fn clip_keeps_part_behind_plane() {
        let clipped = clip_behind(&[
            Pos::new(0.0, 0.0, -1.0),
            Pos::new(4.0, 0.0, 1.0),
            Pos::new(0.0, 4.0, -1.0),
        ]);
        assert_eq!(clipped.points().len(), 4);
        assert_eq!(clipped.points()[1], Vector2::new(2.0, 0.0));
        assert_eq!(clipped.points()[2], Vector2::new(2.0, 2.0));

        let gone = clip_behind(&[Pos::z(), Pos::new(1.0, 0.0, 1.0), Pos::new(0.0, 1.0, 2.0)]);
        assert!(gone.points().is_empty());
    }

    proptest! {
        #[test]
        fn coverage_is_hit_fraction(samples in 1_u32..8, start in -3.0_f32..13.0) {
            // Sample offsets spread over [start, start + 1]; a pixel inside
            // the cube is lit by exactly the samples within [0, 10].
            let rasterizer = Rasterizer::new(cube(10.0), Plane::default(), &config(16, 20.0));
            let offsets = (0..samples)
                .map(|i| start + (i as f32 + 0.5) / samples as f32)
                .collect::<Vec<_>>();

            let inside = offsets.iter().filter(|&&x| (0.0..10.0).contains(&x)).count();
            let image = rasterizer.render(&offsets);
            let expected = inside as f32 / samples as f32;

            prop_assert_eq!(image.pixel(8, 8), Rgb::repeat(expected));
            prop_assert_eq!(image.pixel(0, 0), Rgb::repeat(0.0));
        }
    }
}
