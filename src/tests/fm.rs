use crate::fm::graph::HyperGraph;
use crate::Partitioner;

fn partitioner(input: &str) -> Partitioner {
    Partitioner::new(HyperGraph::parse(input).unwrap()).unwrap()
}

/// All the bookkeeping a move must preserve, checked from scratch.
fn check_invariants(p: &Partitioner) {
    let graph = p.graph();
    for net in &graph.nets {
        let count_a = net
            .cells
            .iter()
            .filter(|&&c| graph.cells[c].part == 0)
            .count() as i32;
        assert_eq!(net.count[0], count_a);
        assert_eq!(net.count[0] + net.count[1], net.cells.len() as i32);
    }
    assert_eq!(p.cut_size(), graph.count_cut());
    let on_a = graph.cells.iter().filter(|c| c.part == 0).count() as i32;
    assert_eq!(p.part_size(0), on_a);
    assert_eq!(
        p.part_size(0) + p.part_size(1),
        graph.num_cells() as i32
    );
}

fn check_balance(p: &Partitioner) {
    let n = p.graph().num_cells() as f64;
    let slack = (p.graph().balance * n / 2.0).ceil() as i32;
    for side in 0..2 {
        assert!((p.part_size(side) as f64 - n / 2.0).abs() <= slack as f64 + 0.5);
    }
}

#[test]
fn chain_of_four_cells() {
    let mut p = partitioner("0.5\nNET N1 a b ;\nNET N2 b c ;\nNET N3 c d ;\n");
    check_invariants(&p);
    p.partition();
    check_invariants(&p);
    check_balance(&p);
    // The chain has min bisection cut 1.
    assert_eq!(p.cut_size(), 1);
}

#[test]
fn two_cliques_uncut() {
    // Two triangles {a,c,d} and {b,e,f}, wired pairwise. The initial split
    // leaves d stranded; FM pulls it over and the cut drops to 0.
    let input = "0.5\n\
                 NET N1 a c ;\nNET N2 a d ;\nNET N3 c d ;\n\
                 NET N4 b e ;\nNET N5 b f ;\nNET N6 e f ;\n";
    let mut p = partitioner(input);
    assert_eq!(p.cut_size(), 2);
    p.partition();
    check_invariants(&p);
    check_balance(&p);
    assert_eq!(p.cut_size(), 0);
    assert_eq!(p.part_size(0), 3);
    assert_eq!(p.part_size(1), 3);
    // Cells in first-appearance order: a, c, d, b, e, f. The triangles must
    // end up on opposite sides.
    let graph = p.graph();
    assert_eq!(graph.cells[0].part, graph.cells[1].part);
    assert_eq!(graph.cells[0].part, graph.cells[2].part);
    assert_ne!(graph.cells[0].part, graph.cells[3].part);
    assert_eq!(graph.cells[3].part, graph.cells[4].part);
    assert_eq!(graph.cells[3].part, graph.cells[5].part);
}

#[test]
fn single_pin_net_counts() {
    let mut p = partitioner("0.5\nNET N1 a b ;\nNET N2 c ;\nNET N3 b c ;\n");
    // The reported total includes the dropped net, the active count does not.
    assert_eq!(p.graph().all_net_num, 3);
    assert_eq!(p.graph().num_nets(), 2);
    p.partition();
    check_invariants(&p);
    assert_eq!(p.summary().num_nets, 3);
}

#[test]
fn wide_nets_stay_consistent() {
    let input = "0.4\n\
                 NET N1 a b c d ;\nNET N2 c d e f ;\nNET N3 a f g h ;\n\
                 NET N4 b g ;\nNET N5 d h e ;\nNET N6 a e ;\n";
    let mut p = partitioner(input);
    let initial_cut = p.cut_size();
    p.partition();
    check_invariants(&p);
    check_balance(&p);
    assert!(p.cut_size() <= initial_cut);
}

#[test]
fn result_format() {
    let mut p = partitioner("0.5\nNET N1 a b ;\nNET N2 b c ;\nNET N3 c d ;\n");
    p.partition();
    let mut out = Vec::new();
    p.write_result(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], format!("Cutsize = {}", p.cut_size()));
    assert_eq!(lines[1], format!("G1 {}", p.part_size(0)));
    assert!(lines[2].ends_with(';'));
    assert_eq!(lines[3], format!("G2 {}", p.part_size(1)));
    assert!(lines[4].ends_with(';'));
    let g1_names = lines[2].trim_end_matches(';').split_whitespace().count();
    let g2_names = lines[4].trim_end_matches(';').split_whitespace().count();
    assert_eq!(g1_names as i32, p.part_size(0));
    assert_eq!(g2_names as i32, p.part_size(1));
}
