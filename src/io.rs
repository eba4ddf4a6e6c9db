use std::fs::File;
use std::io::Write;
use std::path::Path;

use rustc_hash::FxHashMap;
use sprs::io::read_matrix_market;
use sprs::{CsMat, TriMatI};

use crate::graph::Graph;

/// Read a Matrix-Market file and build a partitionable [`Graph`].
///
/// The matrix must be sparse, real or integer, and square. It is made
/// symmetric with `(A + A') / 2`, any diagonal is removed, and the magnitude
/// of each symmetrized entry becomes the edge weight. Vertex weights default
/// to one.
pub fn read_matrix_market_as_graph(file_path: &Path) -> Result<Graph, Box<dyn std::error::Error>> {
    // Attempt to read the file with f64 entries; fall back to i64 for
    // integer-typed matrices.
    let tri_matrix: TriMatI<f64, usize> = match read_matrix_market(file_path) {
        Ok(tri_matrix) => tri_matrix,
        Err(_) => {
            let tri_matrix_i64: TriMatI<i64, usize> = read_matrix_market(file_path)?;
            let mut converted = TriMatI::new((tri_matrix_i64.rows(), tri_matrix_i64.cols()));
            for (value, (row, col)) in tri_matrix_i64.triplet_iter() {
                converted.add_triplet(row, col, *value as f64);
            }
            converted
        }
    };

    if tri_matrix.rows() != tri_matrix.cols() {
        return Err(Box::new(crate::algorithms::Error::InvalidInput(
            "matrix is not square",
        )));
    }
    let n = tri_matrix.rows();

    // Symmetrize with (A + A')/2, folding both orientations of each entry
    // into one unordered key, and drop the diagonal.
    let mut accumulated: FxHashMap<(usize, usize), f64> = FxHashMap::default();
    for (value, (row, col)) in tri_matrix.triplet_iter() {
        if row == col {
            continue;
        }
        let key = if row < col { (row, col) } else { (col, row) };
        *accumulated.entry(key).or_insert(0.0) += *value * 0.5;
    }

    let mut symmetric = TriMatI::with_capacity((n, n), 2 * accumulated.len());
    for (&(row, col), &value) in accumulated.iter() {
        let weight = value.abs();
        if weight == 0.0 {
            continue;
        }
        symmetric.add_triplet(row, col, weight);
        symmetric.add_triplet(col, row, weight);
    }

    let csr: CsMat<f64> = symmetric.to_csr();
    Ok(Graph::from_csmat(csr, None)?)
}

/// Write the partition array to a file.
pub fn write_partition_data_to_file(
    partition: &[usize],
    file_name: &str,
) -> Result<(), std::io::Error> {
    let mut file = File::create(file_name)?;
    for (vertex_id, part) in partition.iter().enumerate() {
        writeln!(file, "vertex {} => partition {}", vertex_id, part)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn create_mock_file(dir: &Path, filename: &str, content: &str) -> String {
        let file_path = dir.join(filename);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_read_real_matrix_symmetrizes_and_strips_diagonal() -> Result<(), std::io::Error> {
        let temp_dir = tempdir()?;

        let content = "\
%%MatrixMarket matrix coordinate real general
%
3 3 5
1 1 9.0
1 2 2.0
2 1 2.0
2 3 4.0
3 2 4.0
";
        let path = create_mock_file(temp_dir.path(), "real_matrix.mtx", content);
        let graph = read_matrix_market_as_graph(Path::new(&path)).unwrap();

        assert_eq!(graph.len(), 3);
        // Diagonal dropped; both edges kept at full weight.
        assert_eq!(graph.stored_entries(), 4);
        assert_eq!(graph.total_edge_weight(), 6.0);
        let row: Vec<_> = graph.neighbors(1).collect();
        assert_eq!(row, vec![(0, 2.0), (2, 4.0)]);
        Ok(())
    }

    #[test]
    fn test_one_sided_entries_get_half_weight() -> Result<(), std::io::Error> {
        let temp_dir = tempdir()?;

        let content = "\
%%MatrixMarket matrix coordinate real general
%
2 2 1
1 2 3.0
";
        let path = create_mock_file(temp_dir.path(), "one_sided.mtx", content);
        let graph = read_matrix_market_as_graph(Path::new(&path)).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.total_edge_weight(), 1.5);
        Ok(())
    }

    #[test]
    fn test_read_integer_matrix_through_the_fallback() -> Result<(), std::io::Error> {
        let temp_dir = tempdir()?;

        let content = "\
%%MatrixMarket matrix coordinate integer general
%
2 2 2
1 2 7
2 1 7
";
        let path = create_mock_file(temp_dir.path(), "int_matrix.mtx", content);
        let graph = read_matrix_market_as_graph(Path::new(&path)).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.total_edge_weight(), 7.0);
        Ok(())
    }

    #[test]
    fn test_disconnected_input_is_rejected() -> Result<(), std::io::Error> {
        let temp_dir = tempdir()?;

        let content = "\
%%MatrixMarket matrix coordinate real general
%
4 4 4
1 2 1.0
2 1 1.0
3 4 1.0
4 3 1.0
";
        let path = create_mock_file(temp_dir.path(), "disconnected.mtx", content);
        assert!(read_matrix_market_as_graph(Path::new(&path)).is_err());
        Ok(())
    }

    #[test]
    fn test_write_partition_data_to_file() -> Result<(), std::io::Error> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("partition.txt");
        write_partition_data_to_file(&[0, 1, 1], path.to_str().unwrap())?;
        let written = std::fs::read_to_string(&path)?;
        assert!(written.contains("vertex 0 => partition 0"));
        assert!(written.contains("vertex 2 => partition 1"));
        Ok(())
    }
}
