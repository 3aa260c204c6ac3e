#![allow(clippy::identity_op)]

use meshlod_rs::progressive::lod::{generate_lod_index_buffer, lod_vertex_count, permute_mesh};
use meshlod_rs::progressive::{progressive_mesh, progressive_mesh_heap};
use meshlod_rs::vertex::cache::{DEFAULT_CACHE_SIZE, analyze_vertex_cache, optimize_vertex_cache};
use std::time::Instant;

const FIFO_SIZE: usize = 16;

/// UV sphere with a bumpy surface, so that collapse costs differ between regions.
fn sphere(rings: u32, segments: u32) -> (Vec<[f32; 3]>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((rings + 1) * segments) as usize);

    for r in 0..=rings {
        let theta = std::f32::consts::PI * r as f32 / rings as f32;

        for s in 0..segments {
            let phi = 2.0 * std::f32::consts::PI * s as f32 / segments as f32;
            let radius = 1.0 + 0.05 * (theta * 7.0).sin() * (phi * 5.0).cos();

            vertices.push([
                radius * theta.sin() * phi.cos(),
                radius * theta.cos(),
                radius * theta.sin() * phi.sin(),
            ]);
        }
    }

    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

    for r in 0..rings {
        for s in 0..segments {
            let a = r * segments + s;
            let b = r * segments + (s + 1) % segments;
            let c = a + segments;
            let d = b + segments;

            // pole rows produce degenerate triangles in positions only, which is fine for the reducer
            indices.extend_from_slice(&[a + 0, c, b]);
            indices.extend_from_slice(&[b + 0, c, d]);
        }
    }

    (vertices, indices)
}

fn main() {
    let verbose = std::env::args().any(|a| a == "-v");

    let (vertices, indices) = sphere(64, 128);

    println!("source: {} vertices, {} triangles", vertices.len(), indices.len() / 3);

    let mut collapse_map = vec![0; vertices.len()];
    let mut permutation = vec![0; vertices.len()];

    let t0 = Instant::now();
    progressive_mesh(&mut collapse_map, &mut permutation, &vertices, &indices).unwrap();
    let t1 = Instant::now();

    let mut heap_collapse_map = vec![0; vertices.len()];
    let mut heap_permutation = vec![0; vertices.len()];

    progressive_mesh_heap(&mut heap_collapse_map, &mut heap_permutation, &vertices, &indices).unwrap();
    let t2 = Instant::now();

    assert_eq!(collapse_map, heap_collapse_map);
    assert_eq!(permutation, heap_permutation);

    println!(
        "progressive mesh: linear {:.2} ms, heap {:.2} ms",
        (t1 - t0).as_secs_f64() * 1_000.0,
        (t2 - t1).as_secs_f64() * 1_000.0
    );

    let mut vertices = vertices;
    let mut indices = indices;
    permute_mesh(&mut vertices, &mut indices, &permutation).unwrap();

    let mut lod_indices = vec![0; indices.len()];
    let mut optimized = vec![0; indices.len()];

    println!("level\tvtx\ttri\tacmr\toptimized\tms");

    for step in 1..=10 {
        let level = step as f32 / 10.0;
        let vertex_count = lod_vertex_count(vertices.len(), level);

        let count = generate_lod_index_buffer(&mut lod_indices, &indices, &collapse_map, vertex_count).unwrap();

        if count == 0 {
            continue;
        }

        let t0 = Instant::now();
        optimize_vertex_cache(
            &mut optimized[0..count],
            &lod_indices[0..count],
            vertex_count,
            0,
            DEFAULT_CACHE_SIZE,
        )
        .unwrap();
        let t1 = Instant::now();

        let before = analyze_vertex_cache(&lod_indices[0..count], vertex_count, FIFO_SIZE, 0, 0).unwrap();
        let after = analyze_vertex_cache(&optimized[0..count], vertex_count, FIFO_SIZE, 0, 0).unwrap();

        println!(
            "{:.1}\t{}\t{}\t{:.3}\t{:.3}\t\t{:.2}",
            level,
            vertex_count,
            count / 3,
            before.acmr,
            after.acmr,
            (t1 - t0).as_secs_f64() * 1_000.0
        );

        if verbose {
            println!(
                "\tvertices transformed {} -> {}, atvr {:.3} -> {:.3}",
                before.vertices_transformed, after.vertices_transformed, before.atvr, after.atvr
            );
        }
    }
}
