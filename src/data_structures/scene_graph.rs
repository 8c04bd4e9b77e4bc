//! Scene graph traversal.
//!
//! Turns a flat node list (as found in a glTF document) into world-space
//! matrices. Traversal is breadth-first over a [`VecDeque`] so hierarchy depth
//! never grows the call stack. Hierarchies are validated before the first
//! visit: dangling indices, cycles and shared children are rejected.

use std::collections::VecDeque;

use cgmath::{Matrix4, Quaternion, SquareMatrix};
use thiserror::Error;

/// A node of the decoded scene: optional local TRS, optional mesh, children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub translation: Option<[f32; 3]>,
    /// Quaternion as `[x, y, z, w]`.
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    /// Column-major local matrix. Takes precedence over TRS when present.
    pub matrix: Option<[f32; 16]>,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

impl Node {
    /// `Shift(T) × Rotation(R) × Diag(S)`; absent fields are identity.
    pub fn local_matrix(&self) -> Matrix4<f32> {
        match self.matrix {
            Some(m) => {
                let columns: [[f32; 4]; 4] = [
                    [m[0], m[1], m[2], m[3]],
                    [m[4], m[5], m[6], m[7]],
                    [m[8], m[9], m[10], m[11]],
                    [m[12], m[13], m[14], m[15]],
                ];
                columns.into()
            }
            None => trs(self.translation, self.rotation, self.scale),
        }
    }
}

pub fn trs(
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
) -> Matrix4<f32> {
    let mut m = Matrix4::identity();
    if let Some([x, y, z]) = scale {
        m = Matrix4::from_nonuniform_scale(x, y, z) * m;
    }
    if let Some([x, y, z, w]) = rotation {
        m = Matrix4::from(Quaternion::new(w, x, y, z)) * m;
    }
    if let Some(t) = translation {
        m = Matrix4::from_translation(t.into()) * m;
    }
    m
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("root index {root} is out of range for {len} nodes")]
    DanglingRoot { root: usize, len: usize },
    #[error("node {node} lists child {child}, but there are only {len} nodes")]
    DanglingChild { node: usize, child: usize, len: usize },
    #[error("node {node} references mesh {mesh}, but there are only {len} meshes")]
    DanglingMesh { node: usize, mesh: usize, len: usize },
    #[error("node {node} is its own ancestor")]
    Cycle { node: usize },
    #[error("node {node} is reachable along more than one path")]
    SharedNode { node: usize },
}

/// A node as handed to the traversal visitor: its index and world matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct VisitedNode {
    pub index: usize,
    pub matrix: Matrix4<f32>,
}

/// Checks that every node reachable from `roots` forms a forest over `nodes`.
///
/// `mesh_count` bounds the mesh references; pass `None` to skip that check.
pub fn validate(
    nodes: &[Node],
    roots: &[usize],
    mesh_count: Option<usize>,
) -> Result<(), GraphError> {
    let len = nodes.len();
    // 0 = unseen, 1 = on the current path, 2 = finished
    let mut state = vec![0u8; len];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for &root in roots {
        if root >= len {
            return Err(GraphError::DanglingRoot { root, len });
        }
        match state[root] {
            0 => {}
            _ => return Err(GraphError::SharedNode { node: root }),
        }
        state[root] = 1;
        stack.push((root, 0));

        while let Some(&mut (node, ref mut next_child)) = stack.last_mut() {
            if *next_child == 0 {
                if let (Some(mesh), Some(meshes)) = (nodes[node].mesh, mesh_count) {
                    if mesh >= meshes {
                        return Err(GraphError::DanglingMesh {
                            node,
                            mesh,
                            len: meshes,
                        });
                    }
                }
            }
            match nodes[node].children.get(*next_child).copied() {
                Some(child) => {
                    *next_child += 1;
                    if child >= len {
                        return Err(GraphError::DanglingChild { node, child, len });
                    }
                    match state[child] {
                        0 => {
                            state[child] = 1;
                            stack.push((child, 0));
                        }
                        1 => return Err(GraphError::Cycle { node: child }),
                        _ => return Err(GraphError::SharedNode { node: child }),
                    }
                }
                None => {
                    state[node] = 2;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

/// Visits every node reachable from `roots` breadth-first, handing the visitor
/// the node's world matrix and mesh reference.
///
/// Nodes without a mesh are still visited and still propagate their matrix to
/// their children. Roots are visited in the order given.
pub fn traverse(
    nodes: &[Node],
    roots: &[usize],
    mut visit: impl FnMut(&VisitedNode, Option<usize>),
) -> Result<(), GraphError> {
    validate(nodes, roots, None)?;

    let mut queue: VecDeque<VisitedNode> = VecDeque::with_capacity(roots.len());
    queue.extend(roots.iter().map(|&index| VisitedNode {
        index,
        matrix: nodes[index].local_matrix(),
    }));

    while let Some(visited) = queue.pop_front() {
        let node = &nodes[visited.index];
        visit(&visited, node.mesh);
        for &child in &node.children {
            queue.push_back(VisitedNode {
                index: child,
                matrix: visited.matrix * nodes[child].local_matrix(),
            });
        }
    }
    Ok(())
}

/// Collects the traversal into `(world_matrix, node_index, mesh_index)` tuples.
pub fn flatten(
    nodes: &[Node],
    roots: &[usize],
) -> Result<Vec<(Matrix4<f32>, usize, Option<usize>)>, GraphError> {
    let mut out = Vec::with_capacity(nodes.len());
    traverse(nodes, roots, |visited, mesh| {
        out.push((visited.matrix, visited.index, mesh))
    })?;
    Ok(out)
}
