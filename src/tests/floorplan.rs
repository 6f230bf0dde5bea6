use crate::floorplan::{parse_input, SaConfig};
use crate::Floorplanner;

const BLK: &str = "Outline: 5 3\nNumBlocks: 2\nNumTerminals: 1\n\
                   b1 3 2\nb2 2 3\nt1 terminal 7 1\n";
const NET: &str = "NumNets: 2\nNetDegree: 2\nb1 b2\nNetDegree: 2\nb1 t1\n";

fn config() -> SaConfig {
    // Shorter sweeps than the tuned defaults keep the test fast.
    SaConfig {
        perturb_factor: 10,
        adaptive_num: 100,
        ..SaConfig::default()
    }
}

#[test]
fn two_blocks_fit_tight_outline() {
    let input = parse_input(BLK, NET).unwrap();
    let mut fp = Floorplanner::new(input, 0.5, config());
    fp.floorplan();

    // 3x2 and 2x3 side by side fill the 5x3 outline exactly, so a feasible
    // solution exists and must be found.
    assert!(fp.found_feasible());
    let (box_x, box_y) = fp.best_box();
    assert!(box_x <= 5 && box_y <= 3, "best box {box_x}x{box_y} outside outline");

    // The recorded best snapshot is a legal packing inside the box.
    let blocks = fp.tree().real();
    for blk in blocks {
        assert!(blk.best_xl >= 0 && blk.best_yl >= 0);
        assert!(blk.best_xl + blk.best_width() <= box_x);
        assert!(blk.best_yl + blk.best_height() <= box_y);
    }
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            let disjoint = a.best_xl + a.best_width() <= b.best_xl
                || b.best_xl + b.best_width() <= a.best_xl
                || a.best_yl + a.best_height() <= b.best_yl
                || b.best_yl + b.best_height() <= a.best_yl;
            assert!(disjoint, "best blocks {} and {} overlap", a.name, b.name);
        }
    }
}

#[test]
fn output_format() {
    let input = parse_input(BLK, NET).unwrap();
    let mut fp = Floorplanner::new(input, 0.5, config());
    fp.floorplan();
    let mut out = Vec::new();
    fp.write_output(&mut out, 1.25).unwrap();
    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    // cost, wirelength, area, box, runtime, then one line per block.
    assert_eq!(lines.len(), 5 + 2);
    let area: i64 = lines[2].parse().unwrap();
    let (box_x, box_y) = fp.best_box();
    assert_eq!(area, box_x as i64 * box_y as i64);
    assert_eq!(lines[3], format!("{box_x} {box_y}"));
    assert_eq!(lines[4], "1.250000");
    for line in &lines[5..] {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 5);
        let xl: i32 = fields[1].parse().unwrap();
        let xr: i32 = fields[3].parse().unwrap();
        assert!(xl < xr);
    }
}

#[test]
fn same_seed_same_floorplan() {
    let run = || {
        let input = parse_input(BLK, NET).unwrap();
        let mut fp = Floorplanner::new(input, 0.5, config());
        fp.floorplan();
        let mut out = Vec::new();
        fp.write_output(&mut out, 0.0).unwrap();
        out
    };
    assert_eq!(run(), run());
}

#[test]
fn loose_outline_trivially_feasible() {
    let blk = "Outline: 40 40\nNumBlocks: 3\nNumTerminals: 0\n\
               b1 3 2\nb2 2 3\nb3 2 2\n";
    let net = "NumNets: 1\nNetDegree: 3\nb1 b2 b3\n";
    let input = parse_input(blk, net).unwrap();
    let mut fp = Floorplanner::new(input, 0.25, config());
    fp.floorplan();
    assert!(fp.found_feasible());
    let (box_x, box_y) = fp.best_box();
    assert!(box_x <= 40 && box_y <= 40);
    // Total block area 18 bounds the best box from below.
    assert!(box_x as i64 * box_y as i64 >= 18);
}
