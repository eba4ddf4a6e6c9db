use std::path::Path;
use std::time::Instant;

use GraphSep::compute_edge_cut;
use GraphSep::imbalance::imbalance;
use GraphSep::io::read_matrix_market_as_graph;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: GraphSep <matrix-market-file>")?;
    let graph = read_matrix_market_as_graph(Path::new(&path))?;
    let start = Instant::now();
    let cut = compute_edge_cut(&graph)?;
    let elapsed_time = start.elapsed();
    let relative_imbalance = imbalance(&graph, &cut.partition);
    println!("Vertices {:?}", graph.len());
    println!("Edge cut {:?}", cut.cut_cost);
    println!("Cut size {:?}", cut.cut_size);
    println!("Part weights {:?} / {:?}", cut.w0, cut.w1);
    println!("Imbalance {:?}", relative_imbalance);
    println!("Execution time {:?}", elapsed_time);
    Ok(())
}
