//! Second-pass chunk partitioning and output assembly
//!
//! A chunk may reference up to 65535 local vertices, but the engine prefers
//! smaller draw batches. Parts are grown breadth-first over triangles that
//! share vertices so each part stays spatially coherent.

use std::collections::VecDeque;

use smallvec::SmallVec;

use super::types::{BoneTag, Chunk, OutputMesh, ShellSlot, TriChunk};

/// Count the vertices of `tri` not yet used by the current part
fn fresh_vertices(tri: &[u16; 3], stamps: &[usize], stamp: usize) -> usize {
    tri.iter()
        .enumerate()
        .filter(|&(i, &v)| stamps[v as usize] != stamp && !tri[..i].contains(&v))
        .count()
}

/// Split triangles into parts of at most `budget` distinct vertices
///
/// Returns triangle indices per part. Every triangle lands in exactly one
/// part, and parts are ordered by their first triangle. `budget` must be at
/// least 3 so that any single triangle fits into an empty part.
pub fn split_triangles(triangles: &[[u16; 3]], vertex_count: usize, budget: usize) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<SmallVec<[u32; 8]>> = vec![SmallVec::new(); vertex_count];
    for (t, tri) in triangles.iter().enumerate() {
        for &v in tri {
            let users = &mut adjacency[v as usize];
            if users.last() != Some(&(t as u32)) {
                users.push(t as u32);
            }
        }
    }

    let mut assigned = vec![false; triangles.len()];
    let mut vertex_stamp = vec![0usize; vertex_count];
    let mut queued_stamp = vec![0usize; triangles.len()];
    let mut queue = VecDeque::new();
    let mut parts = Vec::new();
    let mut cursor = 0;

    loop {
        while cursor < triangles.len() && assigned[cursor] {
            cursor += 1;
        }
        if cursor == triangles.len() {
            break;
        }

        let stamp = parts.len() + 1;
        let mut part = Vec::new();
        let mut used = 0;
        let mut seed = cursor;
        queued_stamp[seed] = stamp;
        queue.push_back(seed);

        loop {
            while let Some(t) = queue.pop_front() {
                if assigned[t] {
                    continue;
                }
                let tri = &triangles[t];
                let fresh = fresh_vertices(tri, &vertex_stamp, stamp);
                if used + fresh > budget {
                    // left for a later part
                    continue;
                }
                used += fresh;
                assigned[t] = true;
                part.push(t);
                for &v in tri {
                    vertex_stamp[v as usize] = stamp;
                    for &next in &adjacency[v as usize] {
                        let next = next as usize;
                        if !assigned[next] && queued_stamp[next] != stamp {
                            queued_stamp[next] = stamp;
                            queue.push_back(next);
                        }
                    }
                }
            }

            // top up from the next untouched triangle in source order
            while seed < triangles.len() && (assigned[seed] || queued_stamp[seed] == stamp) {
                seed += 1;
            }
            if seed == triangles.len()
                || used + fresh_vertices(&triangles[seed], &vertex_stamp, stamp) > budget
            {
                break;
            }
            queued_stamp[seed] = stamp;
            queue.push_back(seed);
        }

        parts.push(part);
    }

    parts
}

/// Collects final chunks into one global vertex array
#[derive(Debug, Default)]
pub struct OutputBuilder {
    mesh: OutputMesh,
    shell: ShellSlot,
}

impl OutputBuilder {
    pub fn new(shell: ShellSlot) -> Self {
        Self {
            mesh: OutputMesh::default(),
            shell,
        }
    }

    /// Append a chunk as a single final chunk
    pub fn append_whole(&mut self, chunk: Chunk) {
        let offset = self.mesh.vertices.len() as u32;
        let vertex_count = chunk.vertices.len() as u32;
        self.mesh.vertices.extend(chunk.vertices);
        let triangles = chunk
            .triangles
            .iter()
            .map(|tri| tri.map(|v| offset + v as u32))
            .collect();
        self.push_chunk(chunk.bone, offset, vertex_count, triangles);
    }

    /// Append a chunk split into parts of at most `budget` vertices
    pub fn append_partitioned(&mut self, chunk: Chunk, budget: usize) {
        if chunk.vertices.len() <= budget {
            self.append_whole(chunk);
            return;
        }

        let parts = split_triangles(&chunk.triangles, chunk.vertices.len(), budget);
        tracing::debug!(
            "Split {} chunk of {} verts into {} parts",
            chunk.bone,
            chunk.vertices.len(),
            parts.len()
        );

        let mut remap = vec![u32::MAX; chunk.vertices.len()];
        for part in parts {
            let offset = self.mesh.vertices.len() as u32;
            let mut used: Vec<u16> = Vec::new();
            let triangles = part
                .iter()
                .map(|&t| {
                    chunk.triangles[t].map(|v| {
                        let slot = &mut remap[v as usize];
                        if *slot == u32::MAX {
                            *slot = offset + used.len() as u32;
                            used.push(v);
                        }
                        *slot
                    })
                })
                .collect();

            self.mesh
                .vertices
                .extend(used.iter().map(|&v| chunk.vertices[v as usize].clone()));
            for &v in &used {
                remap[v as usize] = u32::MAX;
            }
            self.push_chunk(chunk.bone, offset, used.len() as u32, triangles);
        }
    }

    fn push_chunk(&mut self, bone: BoneTag, vertex_offset: u32, vertex_count: u32, triangles: Vec<[u32; 3]>) {
        self.mesh.chunks.push(TriChunk {
            bone,
            vertex_offset,
            vertex_count,
            triangles,
            shell: self.shell,
        });
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len()
    }

    pub fn finish(self) -> OutputMesh {
        self.mesh
    }
}
