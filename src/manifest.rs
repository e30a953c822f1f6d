use std::io;

use serde::Serialize;

/// One exported mesh file. `id` equals the mesh's index in the source
/// scene's flat mesh list.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentRecord {
    pub file: String,
    pub id: u32,
}

/// Placement of one component instance: the component id and the node's
/// scene-absolute transform, 16 doubles in row-major order.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyRecord {
    pub component: u32,
    pub transform: [f64; 16],
}

/// The JSON document pairing exported component files with their placement
/// transforms. Serialized once at the end of a run.
#[derive(Debug, Default, Serialize)]
pub struct Manifest {
    pub components: Vec<ComponentRecord>,
    pub assembly: Vec<AssemblyRecord>,
}

impl Manifest {
    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer(writer, self)
    }
}

/// Component records in export order, with a mesh-index lookup that does
/// not assume ids line up with positions.
#[derive(Debug, Default)]
pub struct ComponentTable {
    records: Vec<ComponentRecord>,
}

impl ComponentTable {
    pub fn new(records: Vec<ComponentRecord>) -> Self {
        Self { records }
    }

    /// Resolves a scene mesh index to its component id. The positional slot
    /// is checked first, with a full scan as fallback.
    pub fn id_for(&self, mesh_index: usize) -> Option<u32> {
        match self.records.get(mesh_index) {
            Some(record) if record.id as usize == mesh_index => Some(record.id),
            _ => self
                .records
                .iter()
                .find(|record| record.id as usize == mesh_index)
                .map(|record| record.id),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ComponentRecord> {
        self.records
    }
}
