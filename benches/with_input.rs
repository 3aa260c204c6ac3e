use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use meshlod_rs::Stream;
use meshlod_rs::index::generator::{generate_vertex_remap, remap_index_buffer, remap_vertex_buffer};
use meshlod_rs::progressive::lod::{generate_lod_index_buffer, lod_vertex_count, permute_mesh};
#[cfg(feature = "experimental")]
use meshlod_rs::progressive::progressive_mesh_heap;
use meshlod_rs::progressive::progressive_mesh;
use meshlod_rs::vertex::Position;
use meshlod_rs::vertex::cache::{DEFAULT_CACHE_SIZE, MAX_CACHE_SIZE, analyze_vertex_cache, optimize_vertex_cache};

use std::fmt::Debug;
use std::path::Path;

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Vertex {
    p: [f32; 3],
    n: [f32; 3],
    t: [f32; 2],
}

impl Position for Vertex {
    fn pos(&self) -> [f32; 3] {
        self.p
    }
}

#[derive(Clone, Default)]
struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn load<P>(path: P) -> Result<Mesh, tobj::LoadError>
    where
        P: AsRef<Path> + Clone + Debug,
    {
        let (models, _materials) = tobj::load_obj(
            path.clone(),
            &tobj::LoadOptions {
                triangulate: true,
                ..Default::default()
            },
        )?;

        let mut vertices = Vec::new();

        for model in models.iter() {
            let mesh = &model.mesh;
            assert!(mesh.positions.len().is_multiple_of(3));

            vertices.reserve(mesh.indices.len());

            for i in 0..mesh.indices.len() {
                let mut vertex = Vertex::default();

                let pi = mesh.indices[i] as usize;
                vertex.p.copy_from_slice(&mesh.positions[3 * pi..3 * (pi + 1)]);

                if !mesh.normals.is_empty() {
                    let ni = mesh.normal_indices[i] as usize;
                    vertex.n.copy_from_slice(&mesh.normals[3 * ni..3 * (ni + 1)]);
                }

                if !mesh.texcoords.is_empty() {
                    let ti = mesh.texcoord_indices[i] as usize;
                    vertex.t.copy_from_slice(&mesh.texcoords[2 * ti..2 * (ti + 1)]);
                }

                vertices.push(vertex);
            }
        }

        Ok(Mesh::from_unindexed(&vertices))
    }

    /// Height field grid, used when no input file is given.
    pub fn grid(size: u32) -> Mesh {
        let mut vertices = Vec::new();

        for y in 0..=size {
            for x in 0..=size {
                let (fx, fy) = (x as f32, y as f32);

                vertices.push(Vertex {
                    p: [fx, fy, (fx * 0.3).sin() * (fy * 0.2).cos()],
                    n: [0.0, 0.0, 1.0],
                    t: [fx / size as f32, fy / size as f32],
                });
            }
        }

        let mut indices = Vec::new();

        for y in 0..size {
            for x in 0..size {
                let v = y * (size + 1) + x;

                indices.extend_from_slice(&[v, v + size + 1, v + 1, v + 1, v + size + 1, v + size + 2]);
            }
        }

        Mesh { vertices, indices }
    }

    fn from_unindexed(vertices: &[Vertex]) -> Mesh {
        let mut remap = vec![0; vertices.len()];
        let total_vertices = generate_vertex_remap::<u32>(&mut remap, None, &Stream::from_slice(vertices)).unwrap();

        let mut result = Mesh {
            vertices: vec![Vertex::default(); total_vertices],
            indices: remap.clone(),
        };

        remap_vertex_buffer(&mut result.vertices, vertices, &remap).unwrap();

        result
    }

    /// Welds vertices by position only, so attribute seams don't split the surface during reduction.
    fn weld_positions(&self) -> Mesh {
        let mut remap = vec![0; self.vertices.len()];
        let position_stream = Stream::from_slice_with_subset(&self.vertices, 0..std::mem::size_of::<f32>() * 3);
        let total_vertices = generate_vertex_remap(&mut remap, Some(&self.indices[..]), &position_stream).unwrap();

        let mut result = Mesh {
            vertices: vec![Vertex::default(); total_vertices],
            indices: self.indices.clone(),
        };

        remap_index_buffer(&mut result.indices, &remap).unwrap();
        remap_vertex_buffer(&mut result.vertices, &self.vertices, &remap).unwrap();

        result
    }
}

fn with_input(c: &mut Criterion) {
    let input_name = std::env::var("MESHLOD_BENCH_INPUT").unwrap_or_default();

    let mesh = if input_name.is_empty() {
        Mesh::grid(64)
    } else {
        Mesh::load(Path::new(&input_name)).unwrap()
    };

    let input_name = if input_name.is_empty() { "grid" } else { &input_name };

    let mut group = c.benchmark_group("optimize_vertex_cache");
    group.throughput(Throughput::Elements((mesh.indices.len() / 3) as u64));

    for cache_size in [16, DEFAULT_CACHE_SIZE, MAX_CACHE_SIZE as u16] {
        group.bench_with_input(BenchmarkId::new(input_name, cache_size), &mesh, |b, mesh| {
            let mut result = mesh.indices.clone();

            b.iter(|| optimize_vertex_cache(&mut result, &mesh.indices, mesh.vertices.len(), 0, cache_size).unwrap());
        });
    }

    group.finish();

    c.bench_with_input(
        BenchmarkId::new("analyze_vertex_cache", input_name),
        &mesh,
        |b, mesh| {
            const CACHE_SIZE: usize = 16;

            b.iter(|| analyze_vertex_cache(&mesh.indices, mesh.vertices.len(), CACHE_SIZE, 0, 0).unwrap());
        },
    );

    let welded = mesh.weld_positions();

    let mut group = c.benchmark_group("progressive_mesh");
    group.sample_size(10);

    group.bench_with_input(BenchmarkId::new("linear", input_name), &welded, |b, mesh| {
        let mut collapse_map = vec![0; mesh.vertices.len()];
        let mut permutation = vec![0; mesh.vertices.len()];

        b.iter(|| progressive_mesh(&mut collapse_map, &mut permutation, &mesh.vertices, &mesh.indices).unwrap());
    });

    #[cfg(feature = "experimental")]
    group.bench_with_input(BenchmarkId::new("heap", input_name), &welded, |b, mesh| {
        let mut collapse_map = vec![0; mesh.vertices.len()];
        let mut permutation = vec![0; mesh.vertices.len()];

        b.iter(|| progressive_mesh_heap(&mut collapse_map, &mut permutation, &mesh.vertices, &mesh.indices).unwrap());
    });

    group.finish();

    let mut permuted = welded.clone();
    let mut collapse_map = vec![0; permuted.vertices.len()];
    let mut permutation = vec![0; permuted.vertices.len()];
    progressive_mesh(&mut collapse_map, &mut permutation, &welded.vertices, &welded.indices).unwrap();
    permute_mesh(&mut permuted.vertices, &mut permuted.indices, &permutation).unwrap();

    let mut group = c.benchmark_group("generate_lod_index_buffer");
    group.throughput(Throughput::Elements((permuted.indices.len() / 3) as u64));

    for level in [0.25f32, 0.5, 1.0] {
        let vertex_count = lod_vertex_count(permuted.vertices.len(), level);

        group.bench_with_input(BenchmarkId::new(input_name, level), &permuted, |b, mesh| {
            let mut result = vec![0; mesh.indices.len()];

            b.iter(|| generate_lod_index_buffer(&mut result, &mesh.indices, &collapse_map, vertex_count).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, with_input);
criterion_main!(benches);
