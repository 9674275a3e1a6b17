//! Triangulated surface meshes
//!
//! Meshes are rendering targets only: cortex surfaces carry the source
//! estimate, sensor meshes carry measurement topographies. Geometry is fixed
//! once constructed.

use crate::error::{MeegError, MeegResult};
use crate::format_error;
use crate::matrix_io::read_file;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Triangulated surface with per-vertex normals
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vector3<f64>>,
    normals: Vec<Vector3<f64>>,
    triangles: Vec<[usize; 3]>,
}

/// Geometry summary of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshInfo {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub total_area: f64,
    pub min_triangle_area: f64,
    pub max_triangle_area: f64,
    pub bounds_min: [f64; 3],
    pub bounds_max: [f64; 3],
    /// Euler test for a genus-0 closed surface: 2V - F == 4
    pub closed: bool,
    /// No directed edge is shared by two triangles
    pub consistently_oriented: bool,
}

impl Mesh {
    /// Build a mesh and derive vertex normals from the faces
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vector3<f64>>,
        triangles: Vec<[usize; 3]>,
    ) -> MeegResult<Self> {
        let name = name.into();
        Self::check_indices(&name, vertices.len(), &triangles)?;
        let normals = Self::face_averaged_normals(&vertices, &triangles);

        Ok(Mesh {
            name,
            vertices,
            normals,
            triangles,
        })
    }

    /// Build a mesh with explicit vertex normals
    pub fn with_normals(
        name: impl Into<String>,
        vertices: Vec<Vector3<f64>>,
        normals: Vec<Vector3<f64>>,
        triangles: Vec<[usize; 3]>,
    ) -> MeegResult<Self> {
        if normals.len() != vertices.len() {
            return Err(MeegError::DimensionMismatch {
                operation: "mesh normals",
                expected: vertices.len(),
                found: normals.len(),
            });
        }
        let name = name.into();
        Self::check_indices(&name, vertices.len(), &triangles)?;

        Ok(Mesh {
            name,
            vertices,
            normals,
            triangles,
        })
    }

    /// Load a mesh file. Only the TRI format is supported.
    pub fn load(path: &Path) -> MeegResult<Self> {
        let source = path.display().to_string();
        let is_tri = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("tri"))
            .unwrap_or(false);
        if !is_tri {
            return Err(format_error!(source, None, "unsupported mesh format"));
        }

        let text = read_file(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("mesh")
            .to_string();
        let mesh = Self::parse_tri(&name, &text, &source)?;

        let info = mesh.info();
        debug!(
            mesh = %mesh.name,
            vertices = info.vertex_count,
            triangles = info.triangle_count,
            area = info.total_area,
            "mesh loaded"
        );
        if !info.consistently_oriented {
            warn!(mesh = %mesh.name, "mesh is not consistently oriented");
        }
        Ok(mesh)
    }

    /// Parse TRI text.
    ///
    /// Layout: `- N`, N rows of `x y z nx ny nz`, `- M M M`, M rows of
    /// `i j k` with 0-based indices.
    pub fn parse_tri(name: &str, text: &str, source: &str) -> MeegResult<Self> {
        let mut tokens = TriTokens::new(text, source);

        tokens.expect_dash()?;
        let npts = tokens.next_usize()?;
        // Header counts are untrusted; a vertex needs at least 12 bytes of text
        let mut vertices = Vec::with_capacity(npts.min(text.len() / 12));
        let mut normals = Vec::with_capacity(npts.min(text.len() / 12));
        for _ in 0..npts {
            vertices.push(tokens.next_vector()?);
            normals.push(tokens.next_vector()?);
        }

        // The triangle count is written three times; the last one wins.
        tokens.expect_dash()?;
        tokens.next_usize()?;
        tokens.next_usize()?;
        let ntrgs = tokens.next_usize()?;
        let mut triangles = Vec::with_capacity(ntrgs.min(text.len() / 6));
        for _ in 0..ntrgs {
            triangles.push([tokens.next_usize()?, tokens.next_usize()?, tokens.next_usize()?]);
        }

        Self::with_normals(name, vertices, normals, triangles)
            .map_err(|e| match e {
                format @ MeegError::Format { .. } => format,
                other => format_error!(source, None, "{}", other),
            })
    }

    /// Closed UV sphere centred on the origin with single pole vertices
    pub fn uv_sphere(
        name: impl Into<String>,
        radius: f64,
        stacks: usize,
        slices: usize,
    ) -> MeegResult<Self> {
        if stacks < 2 || slices < 3 {
            return Err(MeegError::InvalidConfig {
                reason: format!(
                    "sphere needs at least 2 stacks and 3 slices, got {}x{}",
                    stacks, slices
                ),
            });
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(MeegError::InvalidConfig {
                reason: format!("sphere radius must be positive, got {}", radius),
            });
        }

        let mut vertices = Vec::with_capacity(2 + (stacks - 1) * slices);
        vertices.push(Vector3::new(0.0, 0.0, radius));
        for stack in 1..stacks {
            let phi = std::f64::consts::PI * stack as f64 / stacks as f64;
            for slice in 0..slices {
                let theta = 2.0 * std::f64::consts::PI * slice as f64 / slices as f64;
                vertices.push(Vector3::new(
                    radius * phi.sin() * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                ));
            }
        }
        let south = vertices.len();
        vertices.push(Vector3::new(0.0, 0.0, -radius));

        let ring = |stack: usize, slice: usize| 1 + (stack - 1) * slices + slice % slices;
        let mut triangles = Vec::with_capacity(2 * slices * (stacks - 1));

        // Counter-clockwise seen from outside
        for slice in 0..slices {
            triangles.push([0, ring(1, slice), ring(1, slice + 1)]);
        }
        for stack in 1..stacks - 1 {
            for slice in 0..slices {
                let a = ring(stack, slice);
                let b = ring(stack, slice + 1);
                let c = ring(stack + 1, slice);
                let d = ring(stack + 1, slice + 1);
                triangles.push([a, c, d]);
                triangles.push([a, d, b]);
            }
        }
        for slice in 0..slices {
            triangles.push([south, ring(stacks - 1, slice + 1), ring(stacks - 1, slice)]);
        }

        let normals = vertices.iter().map(|v| v / radius).collect();
        Self::with_normals(name, vertices, normals, triangles)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Area of triangle `index`
    pub fn triangle_area(&self, index: usize) -> MeegResult<f64> {
        let tri = self.triangles.get(index).ok_or(MeegError::IndexOutOfRange {
            what: "triangle",
            index,
            len: self.triangles.len(),
        })?;
        Ok(self.area_of(tri))
    }

    /// Euler characteristic test for a closed genus-0 surface
    pub fn is_closed(&self) -> bool {
        2 * self.vertices.len() == self.triangles.len() + 4
    }

    /// True when every directed edge belongs to at most one triangle
    pub fn has_consistent_orientation(&self) -> bool {
        let mut edges = HashSet::with_capacity(3 * self.triangles.len());
        self.triangles.iter().all(|&[a, b, c]| {
            edges.insert((a, b)) && edges.insert((b, c)) && edges.insert((c, a))
        })
    }

    /// Geometry summary
    pub fn info(&self) -> MeshInfo {
        let mut total_area = 0.0;
        let mut min_area = f64::INFINITY;
        let mut max_area = 0.0_f64;
        for tri in &self.triangles {
            let area = self.area_of(tri);
            total_area += area;
            min_area = min_area.min(area);
            max_area = max_area.max(area);
        }
        if self.triangles.is_empty() {
            min_area = 0.0;
        }

        let mut bounds_min = [f64::INFINITY; 3];
        let mut bounds_max = [f64::NEG_INFINITY; 3];
        for v in &self.vertices {
            for axis in 0..3 {
                bounds_min[axis] = bounds_min[axis].min(v[axis]);
                bounds_max[axis] = bounds_max[axis].max(v[axis]);
            }
        }
        if self.vertices.is_empty() {
            bounds_min = [0.0; 3];
            bounds_max = [0.0; 3];
        }

        MeshInfo {
            vertex_count: self.vertices.len(),
            triangle_count: self.triangles.len(),
            total_area,
            min_triangle_area: min_area,
            max_triangle_area: max_area,
            bounds_min,
            bounds_max,
            closed: self.is_closed(),
            consistently_oriented: self.has_consistent_orientation(),
        }
    }

    fn area_of(&self, &[a, b, c]: &[usize; 3]) -> f64 {
        let ab = self.vertices[b] - self.vertices[a];
        let ac = self.vertices[c] - self.vertices[a];
        0.5 * ab.cross(&ac).norm()
    }

    fn check_indices(name: &str, vertex_count: usize, triangles: &[[usize; 3]]) -> MeegResult<()> {
        for (i, tri) in triangles.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&idx| idx >= vertex_count) {
                return Err(format_error!(
                    name,
                    None,
                    "triangle {} references vertex {} but mesh has {} vertices",
                    i,
                    bad,
                    vertex_count
                ));
            }
        }
        Ok(())
    }

    fn face_averaged_normals(vertices: &[Vector3<f64>], triangles: &[[usize; 3]]) -> Vec<Vector3<f64>> {
        let mut normals = vec![Vector3::zeros(); vertices.len()];
        for &[a, b, c] in triangles {
            // Area weighted: the cross product length is twice the area
            let n = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        for n in &mut normals {
            let len = n.norm();
            if len > 0.0 {
                *n /= len;
            }
        }
        normals
    }
}

impl fmt::Display for MeshInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vertices:  {}", self.vertex_count)?;
        writeln!(f, "triangles: {}", self.triangle_count)?;
        writeln!(f, "area:      {:.6e} (min {:.3e}, max {:.3e})",
                 self.total_area, self.min_triangle_area, self.max_triangle_area)?;
        writeln!(f, "bounds:    {:?} .. {:?}", self.bounds_min, self.bounds_max)?;
        write!(f, "closed: {}, oriented: {}", self.closed, self.consistently_oriented)
    }
}

/// Whitespace tokenizer tracking line numbers for error reports
struct TriTokens<'a> {
    source: &'a str,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: std::str::SplitWhitespace<'a>,
    pending: Option<&'a str>,
    line: usize,
}

impl<'a> TriTokens<'a> {
    fn new(text: &'a str, source: &'a str) -> Self {
        Self {
            source,
            lines: text.lines().enumerate(),
            current: "".split_whitespace(),
            pending: None,
            line: 0,
        }
    }

    fn next_token(&mut self) -> MeegResult<&'a str> {
        if let Some(token) = self.pending.take() {
            return Ok(token);
        }
        loop {
            if let Some(token) = self.current.next() {
                return Ok(token);
            }
            match self.lines.next() {
                Some((idx, line)) => {
                    self.line = idx + 1;
                    self.current = line.split_whitespace();
                }
                None => {
                    return Err(format_error!(self.source, None, "unexpected end of file"));
                }
            }
        }
    }

    fn expect_dash(&mut self) -> MeegResult<()> {
        let token = self.next_token()?;
        match token.strip_prefix('-') {
            Some("") => Ok(()),
            // Compact `-N` header
            Some(rest) => {
                self.pending = Some(rest);
                Ok(())
            }
            None => Err(format_error!(self.source, Some(self.line), "expected '-', found '{}'", token)),
        }
    }

    fn next_usize(&mut self) -> MeegResult<usize> {
        let token = self.next_token()?;
        token.parse().map_err(|_| {
            format_error!(self.source, Some(self.line), "'{}' is not an index", token)
        })
    }

    fn next_f64(&mut self) -> MeegResult<f64> {
        let token = self.next_token()?;
        token.parse().map_err(|_| {
            format_error!(self.source, Some(self.line), "'{}' is not a number", token)
        })
    }

    fn next_vector(&mut self) -> MeegResult<Vector3<f64>> {
        Ok(Vector3::new(self.next_f64()?, self.next_f64()?, self.next_f64()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA: &str = "\
- 4
0 0 0  0 0 -1
1 0 0  0 0 -1
0 1 0  0 0 -1
0 0 1  1 1 1
- 4 4 4
0 2 1
0 1 3
1 2 3
0 3 2
";

    #[test]
    fn test_parse_tri() {
        let mesh = Mesh::parse_tri("tetra", TETRA, "tetra.tri").unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.normals()[3], Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(mesh.triangles()[2], [1, 2, 3]);
        assert!(mesh.is_closed());
        assert!(mesh.has_consistent_orientation());
    }

    #[test]
    fn test_tri_out_of_range_index() {
        let text = "- 3\n0 0 0 0 0 1\n1 0 0 0 0 1\n0 1 0 0 0 1\n- 1 1 1\n0 1 7\n";
        let err = Mesh::parse_tri("bad", text, "bad.tri").unwrap_err();
        assert!(matches!(err, MeegError::Format { .. }));
        assert!(err.to_string().contains("vertex 7"));
    }

    #[test]
    fn test_tri_truncated() {
        let truncated = &TETRA[..TETRA.len() - 8];
        assert!(Mesh::parse_tri("tetra", truncated, "tetra.tri").is_err());
        assert!(Mesh::parse_tri("tetra", "4\n", "tetra.tri").is_err());
    }

    #[test]
    fn test_tri_header_counts_beyond_file() {
        let huge = "- 18446744073709551615\n0 0 0 0 0 1\n";
        let err = Mesh::parse_tri("x", huge, "x.tri").unwrap_err();
        assert!(err.to_string().contains("unexpected end of file"));

        let lying = "- 1000000000\n0 0 0 0 0 1\n";
        assert!(matches!(
            Mesh::parse_tri("x", lying, "x.tri"),
            Err(MeegError::Format { .. })
        ));

        let triangles = "- 3\n0 0 0 0 0 1\n1 0 0 0 0 1\n0 1 0 0 0 1\n- 1 1 18446744073709551615\n0 1 2\n";
        assert!(matches!(
            Mesh::parse_tri("x", triangles, "x.tri"),
            Err(MeegError::Format { .. })
        ));
    }

    #[test]
    fn test_tri_compact_headers() {
        let compact = TETRA.replacen("- 4\n", "-4\n", 1).replacen("- 4 4 4", "-4 4 4", 1);
        let mesh = Mesh::parse_tri("tetra", &compact, "tetra.tri").unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);

        let err = Mesh::parse_tri("tetra", "+4\n", "tetra.tri").unwrap_err();
        assert!(err.to_string().contains("expected '-'"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Mesh::load(Path::new("cortex.vtk")).unwrap_err();
        assert!(err.to_string().contains("unsupported mesh format"));
    }

    #[test]
    fn test_missing_mesh_file() {
        let err = Mesh::load(Path::new("/nonexistent/cortex.tri")).unwrap_err();
        assert!(matches!(err, MeegError::Io { .. }));
    }

    #[test]
    fn test_uv_sphere_is_closed_and_oriented() {
        let sphere = Mesh::uv_sphere("sphere", 2.0, 8, 12).unwrap();
        let info = sphere.info();

        assert_eq!(info.vertex_count, 2 + 7 * 12);
        assert!(info.closed);
        assert!(info.consistently_oriented);

        // Inscribed polyhedron area approaches 4*pi*r^2 from below
        let exact = 4.0 * std::f64::consts::PI * 4.0;
        assert!(info.total_area < exact);
        assert!(info.total_area > 0.9 * exact);

        for (v, n) in sphere.vertices().iter().zip(sphere.normals()) {
            assert!((v.norm() - 2.0).abs() < 1e-12);
            assert!((n.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_uv_sphere_faces_point_outward() {
        let sphere = Mesh::uv_sphere("sphere", 1.0, 6, 8).unwrap();
        for &[a, b, c] in sphere.triangles() {
            let v = sphere.vertices();
            let n = (v[b] - v[a]).cross(&(v[c] - v[a]));
            let centroid = (v[a] + v[b] + v[c]) / 3.0;
            assert!(n.dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn test_derived_normals() {
        let mesh = Mesh::new(
            "square",
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();

        for n in mesh.normals() {
            assert!((n - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
        }
        assert!((mesh.triangle_area(0).unwrap() - 0.5).abs() < 1e-12);
        assert!(mesh.triangle_area(2).is_err());
        assert!(!mesh.is_closed());
    }

    #[test]
    fn test_inconsistent_orientation_detected() {
        let mesh = Mesh::new(
            "flipped",
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 1, 3]],
        )
        .unwrap();
        assert!(!mesh.has_consistent_orientation());
    }
}
