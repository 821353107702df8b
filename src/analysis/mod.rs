//! Iterative dataflow analyses.
//!
//! Three fixed-point solvers over a function's block graph: backward
//! liveness, forward available expressions and forward definitely-assigned
//! variables. Each solver is a pure function of the current block contents;
//! optimisation passes re-run the analysis they need immediately before
//! consuming it.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::cfg::{BlockId, Graph};
use crate::ir::{is_builtin, Instr, Name, Rhs, Value};

/// An entry in the available-expression maps. `Conflict` marks a variable
/// assigned along every path whose right-hand sides disagree, so later
/// passes can tell "unknown here" apart from "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avail {
    Conflict,
    Rhs(Rhs),
}

/// Solve backward liveness to a fixed point. The live-out of a block is the
/// union of its successors' live-ins; exit blocks of non-`main` functions
/// additionally keep every global live, since the caller may observe them.
pub fn liveness(graph: &mut Graph) {
    let ids = graph.block_ids();
    let mut changed = true;
    let mut rounds = 0;
    while changed {
        changed = false;
        for &id in &ids {
            changed |= update_liveness(graph, id);
        }
        rounds += 1;
    }
    trace!("liveness of {} converged after {} rounds", graph.name(), rounds);
}

fn update_liveness(graph: &mut Graph, id: BlockId) -> bool {
    let mut out: BTreeSet<Name> = BTreeSet::new();
    for succ in graph.block(id).succs.iter().copied().collect::<Vec<_>>() {
        out.extend(graph.block(succ).live_in.iter().cloned());
    }
    if graph.block(id).succs.is_empty() && !graph.is_main() {
        out.extend(graph.globals().iter().cloned());
    }

    let mut live = out.clone();
    for instr in graph.block(id).instrs.iter().rev() {
        transfer_liveness(instr, graph.globals(), &mut live);
    }

    let block = graph.block_mut(id);
    block.live_out = out;
    let changed = block.live_in != live;
    block.live_in = live;
    changed
}

pub(crate) fn transfer_liveness(
    instr: &Instr<BlockId>,
    globals: &BTreeSet<Name>,
    live: &mut BTreeSet<Name>,
) {
    if let Some(dest) = instr.dest() {
        live.remove(dest);
    }
    for read in instr.reads() {
        live.insert(read.clone());
    }
    if let Instr::Call { callee, .. } = instr {
        // A non-builtin callee may read any global.
        if !is_builtin(callee) {
            live.extend(globals.iter().cloned());
        }
    }
}

/// Solve forward available expressions to a fixed point. The meet
/// intersects predecessor out-map domains, keeps identical values, and
/// records disagreeing values as [`Avail::Conflict`].
pub fn available(graph: &mut Graph) {
    let ids = graph.block_ids();
    let mut changed = true;
    while changed {
        changed = false;
        for &id in &ids {
            changed |= update_available(graph, id);
        }
    }
}

fn update_available(graph: &mut Graph, id: BlockId) -> bool {
    let avail_in = if id == graph.entry() {
        BTreeMap::new()
    } else {
        let preds: Vec<_> = graph.block(id).preds.iter().copied().collect();
        let mut merged: Option<BTreeMap<Name, Avail>> = None;
        for pred in preds {
            let pred_out = &graph.block(pred).avail_out;
            merged = Some(match merged {
                None => pred_out.clone(),
                Some(mut acc) => {
                    acc.retain(|name, _| pred_out.contains_key(name));
                    for (name, entry) in acc.iter_mut() {
                        if pred_out[name] != *entry {
                            *entry = Avail::Conflict;
                        }
                    }
                    acc
                }
            });
        }
        merged.unwrap_or_default()
    };

    let mut avail = avail_in.clone();
    for instr in &graph.block(id).instrs {
        transfer_available(instr, graph.globals(), &mut avail);
    }

    let block = graph.block_mut(id);
    block.avail_in = avail_in;
    let changed = block.avail_out != avail;
    block.avail_out = avail;
    changed
}

pub(crate) fn transfer_available(
    instr: &Instr<BlockId>,
    globals: &BTreeSet<Name>,
    avail: &mut BTreeMap<Name, Avail>,
) {
    match instr {
        Instr::Call { dest, callee, .. } => {
            if !is_builtin(callee) {
                // The callee may rewrite any global.
                avail.retain(|name, entry| {
                    !globals.contains(name)
                        && match entry {
                            Avail::Rhs(rhs) => !globals.iter().any(|g| rhs.mentions(g)),
                            Avail::Conflict => true,
                        }
                });
            }
            if let Some(dest) = dest {
                invalidate(avail, dest);
                avail.remove(dest);
            }
        }
        _ => {
            if let (Some(dest), Some(rhs)) = (instr.dest().cloned(), instr.rhs()) {
                invalidate(avail, &dest);
                if rhs.mentions(&dest) {
                    avail.remove(&dest);
                } else {
                    avail.insert(dest, Avail::Rhs(rhs));
                }
            }
        }
    }
}

/// Drop every recorded expression that reads the reassigned name.
fn invalidate(avail: &mut BTreeMap<Name, Avail>, reassigned: &Name) {
    avail.retain(|_, entry| match entry {
        Avail::Rhs(rhs) => !rhs.mentions(reassigned),
        Avail::Conflict => true,
    });
}

/// Solve forward definitely-assigned variables to a fixed point. The entry
/// block seeds the formal parameters, and in non-`main` functions also the
/// globals, which the caller's world has already given a memory home;
/// every assignment adds its target.
pub fn assigned(graph: &mut Graph) {
    let ids = graph.block_ids();
    let mut changed = true;
    while changed {
        changed = false;
        for &id in &ids {
            changed |= update_assigned(graph, id);
        }
    }
}

fn update_assigned(graph: &mut Graph, id: BlockId) -> bool {
    let mut set_in: BTreeSet<Name> = BTreeSet::new();
    for pred in graph.block(id).preds.iter().copied().collect::<Vec<_>>() {
        set_in.extend(graph.block(pred).assigned_out.iter().cloned());
    }
    if id == graph.entry() {
        set_in.extend(graph.params().iter().cloned());
        if !graph.is_main() {
            set_in.extend(graph.globals().iter().cloned());
        }
    }

    let mut set = set_in.clone();
    for instr in &graph.block(id).instrs {
        if let Some(dest) = instr.dest() {
            set.insert(dest.clone());
        }
    }

    let block = graph.block_mut(id);
    block.assigned_in = set_in;
    let changed = block.assigned_out != set;
    block.assigned_out = set;
    changed
}

/// The per-position live sets of one block, for the register allocator:
/// one set before and one after every instruction, plus the block-leading
/// set, in listing order. A destination that is dead immediately after its
/// assignment is injected into the "before" set so that it still conflicts
/// with everything live around the instruction.
///
/// Requires [`liveness`] to have run. Calls conservatively keep every
/// global alive here, builtins included, since the allocator must not share
/// a register between a global and a value that crosses the call.
pub fn live_sets(graph: &Graph, id: BlockId) -> Vec<BTreeSet<Name>> {
    let mut out: BTreeSet<Name> = BTreeSet::new();
    for succ in &graph.block(id).succs {
        out.extend(graph.block(*succ).live_in.iter().cloned());
    }

    let mut sets = vec![];
    let mut live = out;
    for instr in graph.block(id).instrs.iter().rev() {
        sets.push(live.clone());
        if matches!(instr, Instr::Call { .. }) {
            live.extend(graph.globals().iter().cloned());
        }
        let dead_dest = match instr.dest() {
            Some(dest) if !live.remove(dest) => Some(dest.clone()),
            _ => None,
        };
        for read in instr.reads() {
            live.insert(read.clone());
        }
        let mut before = live.clone();
        if let Some(dest) = dead_dest {
            before.insert(dest);
        }
        sets.push(before);
    }
    sets.push(live);
    sets.reverse();
    sets
}

/// Names read before any assignment on some path. A dataflow fact for the
/// front end, not an error at this layer.
pub fn unassigned_reads(graph: &mut Graph) -> BTreeSet<Name> {
    assigned(graph);
    let mut found = BTreeSet::new();
    scan_unassigned(graph, |name| {
        found.insert(name.clone());
        None
    });
    found
}

/// Replace every read of a variable that may be unassigned with the literal
/// zero, so downstream stages never meet an uninitialised name.
pub fn zero_unassigned(graph: &mut Graph) {
    assigned(graph);
    scan_unassigned(graph, |_| Some(Value::Int(0)));
}

fn scan_unassigned(graph: &mut Graph, mut on_read: impl FnMut(&Name) -> Option<Value>) {
    let globals = graph.globals().clone();
    for id in graph.block_ids() {
        let mut set = graph.block(id).assigned_in.clone();
        let block = graph.block_mut(id);
        for instr in block.instrs.iter_mut() {
            let unset: Vec<Name> = instr
                .reads()
                .into_iter()
                .filter(|n| !set.contains(*n))
                .cloned()
                .collect();
            for name in unset {
                if let Some(replacement) = on_read(&name) {
                    instr.replace_uses(&name, &replacement);
                }
            }
            if let Instr::Call { callee, .. } = instr {
                if !is_builtin(callee) {
                    // The callee may assign any global.
                    set.extend(globals.iter().cloned());
                }
            }
            if let Some(dest) = instr.dest() {
                set.insert(dest.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, ValueCode};

    fn name(s: &str) -> Name {
        Name::from(s)
    }

    fn var(s: &str) -> Value {
        Value::Name(name(s))
    }

    fn names(items: &[&str]) -> BTreeSet<Name> {
        items.iter().map(|s| Name::from(*s)).collect()
    }

    fn graph_named(
        fn_name: &str,
        params: &[&str],
        globals: &[&str],
        instrs: Vec<Instr<usize>>,
    ) -> Graph {
        Graph::build(
            fn_name,
            params.iter().map(|p| Name::from(*p)).collect(),
            ValueCode::new(instrs),
            names(globals),
        )
    }

    fn graph(instrs: Vec<Instr<usize>>) -> Graph {
        graph_named("main", &[], &[], instrs)
    }

    #[test]
    fn liveness_flows_backward_through_blocks() {
        // B1: a = 1; JUMP (2) c   B2: (fallthrough) b = a ADD 1   B3: exit
        let mut g = graph(vec![
            Instr::Copy {
                dest: name("a"),
                value: Value::Int(1),
            },
            Instr::Branch {
                cond: var("c"),
                target: 3,
            },
            Instr::Bin {
                dest: name("b"),
                op: BinOp::Add,
                left: var("a"),
                right: Value::Int(1),
            },
            Instr::Copy {
                dest: name("d"),
                value: var("a"),
            },
        ]);

        liveness(&mut g);

        let entry = g.block(g.entry());
        // `c` is read by the branch before anything assigns it.
        assert!(entry.live_in.contains(&name("c")));
        assert!(!entry.live_in.contains(&name("a")));
        // `a` survives the branch into both successors.
        assert!(entry.live_out.contains(&name("a")));
    }

    #[test]
    fn liveness_out_is_union_of_successor_ins() {
        let mut g = graph(vec![
            Instr::Branch {
                cond: var("c"),
                target: 2,
            },
            Instr::Copy {
                dest: name("x"),
                value: var("p"),
            },
            Instr::Copy {
                dest: name("y"),
                value: var("q"),
            },
        ]);

        liveness(&mut g);

        let entry = g.block(g.entry());
        for succ in &entry.succs {
            for live in &g.block(*succ).live_in {
                assert!(
                    entry.live_out.contains(live),
                    "{} missing from live-out",
                    live
                );
            }
        }
    }

    #[test]
    fn exit_of_non_main_function_keeps_globals_live() {
        let mut g = graph_named(
            "helper",
            &[],
            &["g"],
            vec![Instr::Copy {
                dest: name("g"),
                value: Value::Int(5),
            }],
        );

        liveness(&mut g);

        // The assignment to the global is observable by the caller.
        let entry = g.block(g.entry());
        assert!(entry.live_out.contains(&name("g")));
    }

    #[test]
    fn call_keeps_globals_live_unless_builtin() {
        let mut g = graph_named(
            "main",
            &[],
            &["g"],
            vec![
                Instr::Copy {
                    dest: name("g"),
                    value: Value::Int(1),
                },
                Instr::Call {
                    dest: None,
                    callee: "other".to_string(),
                    args: vec![],
                },
            ],
        );

        liveness(&mut g);
        let entry = g.block(g.entry());
        assert!(entry.instrs[0].dest().is_some());
        // `g` must stay live up to the call.
        let mut live = entry.live_out.clone();
        for instr in entry.instrs.iter().rev() {
            transfer_liveness(instr, &names(&["g"]), &mut live);
            if matches!(instr, Instr::Call { .. }) {
                assert!(live.contains(&name("g")));
            }
        }
    }

    #[test]
    fn available_meet_marks_disagreements_conflicting() {
        // A diamond: one arm sets x = 1, the other x = 2, and the join
        // reads x. Both arms reach the join with different copies.
        let mut g = graph(vec![
            Instr::Branch {
                cond: var("c"),
                target: 3,
            },
            Instr::Copy {
                dest: name("x"),
                value: Value::Int(1),
            },
            Instr::Jump { target: 4 },
            Instr::Copy {
                dest: name("x"),
                value: Value::Int(2),
            },
            Instr::Copy {
                dest: name("y"),
                value: var("x"),
            },
        ]);

        available(&mut g);

        let join = g
            .block_ids()
            .into_iter()
            .find(|id| {
                g.block(*id)
                    .instrs
                    .iter()
                    .any(|i| i.dest() == Some(&name("y")))
            })
            .unwrap();
        let join_in = &g.block(join).avail_in;
        assert_eq!(
            Some(&Avail::Conflict),
            join_in.get(&name("x")),
            "in-map: {:?}",
            join_in
        );
    }

    #[test]
    fn available_records_non_self_referential_assignments() {
        let mut g = graph(vec![
            Instr::Bin {
                dest: name("t"),
                op: BinOp::Add,
                left: var("a"),
                right: var("b"),
            },
            Instr::Bin {
                dest: name("t"),
                op: BinOp::Add,
                left: var("t"),
                right: Value::Int(1),
            },
        ]);

        available(&mut g);

        // The self-referential reassignment wipes the recorded expression.
        let entry = g.block(g.entry());
        assert_eq!(None, entry.avail_out.get(&name("t")));
    }

    #[test]
    fn available_call_invalidates_global_expressions() {
        let mut g = graph_named(
            "main",
            &[],
            &["g"],
            vec![
                Instr::Bin {
                    dest: name("t"),
                    op: BinOp::Add,
                    left: var("g"),
                    right: Value::Int(1),
                },
                Instr::Copy {
                    dest: name("u"),
                    value: Value::Int(7),
                },
                Instr::Call {
                    dest: None,
                    callee: "other".to_string(),
                    args: vec![],
                },
            ],
        );

        available(&mut g);

        let entry = g.block(g.entry());
        assert_eq!(None, entry.avail_out.get(&name("t")));
        assert_eq!(
            Some(&Avail::Rhs(Rhs::Value(Value::Int(7)))),
            entry.avail_out.get(&name("u"))
        );
    }

    #[test]
    fn assigned_seeds_parameters_in_entry() {
        let mut g = graph_named(
            "helper",
            &["p"],
            &[],
            vec![Instr::Copy {
                dest: name("x"),
                value: var("p"),
            }],
        );

        assigned(&mut g);

        let entry = g.block(g.entry());
        assert!(entry.assigned_in.contains(&name("p")));
        assert!(entry.assigned_out.contains(&name("x")));
    }

    #[test]
    fn unassigned_reads_are_reported_and_zeroed() {
        let mut g = graph(vec![
            Instr::Bin {
                dest: name("x"),
                op: BinOp::Add,
                left: var("u"),
                right: Value::Int(1),
            },
            Instr::Copy {
                dest: name("y"),
                value: var("x"),
            },
        ]);

        assert_eq!(names(&["u"]), unassigned_reads(&mut g));

        zero_unassigned(&mut g);
        let entry = g.block(g.entry());
        assert!(matches!(
            &entry.instrs[0],
            Instr::Bin { left: Value::Int(0), .. }
        ));
        // `x` was assigned before the read, so it is untouched.
        assert!(matches!(
            &entry.instrs[1],
            Instr::Copy { value: Value::Name(n), .. } if n == &name("x")
        ));
    }

    #[test]
    fn globals_count_as_assigned_inside_helpers() {
        let instrs = vec![Instr::Bin {
            dest: name("g"),
            op: BinOp::Add,
            left: var("g"),
            right: Value::Int(1),
        }];
        let mut helper = graph_named("bump", &[], &["g"], instrs.clone());
        let mut main = graph_named("main", &[], &["g"], instrs);

        // The caller's world already gave the global a memory home, but in
        // main nothing has initialised it yet.
        assert!(unassigned_reads(&mut helper).is_empty());
        assert_eq!(names(&["g"]), unassigned_reads(&mut main));
    }

    #[test]
    fn live_sets_inject_momentarily_dead_destinations() {
        let mut g = graph(vec![
            Instr::Copy {
                dest: name("a"),
                value: Value::Int(1),
            },
            Instr::Copy {
                dest: name("dead"),
                value: Value::Int(2),
            },
            Instr::Call {
                dest: None,
                callee: "printInt".to_string(),
                args: vec![var("a")],
            },
        ]);
        liveness(&mut g);

        let sets = live_sets(&g, g.entry());
        // Two sets per instruction plus the leading one.
        assert_eq!(2 * g.block(g.entry()).instrs.len() + 1, sets.len());
        // The dead destination appears in the set before its assignment, so
        // it will conflict with the concurrently-live `a`.
        let before_dead = &sets[3];
        assert!(before_dead.contains(&name("dead")));
        assert!(before_dead.contains(&name("a")));
    }
}
