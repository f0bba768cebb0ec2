//! Stack and recursion analysis.
//!
//! Runs once per module, after every unit has been generated. The call
//! graph (a `petgraph::DiGraph` with one node per function and one edge per
//! direct callee) is walked depth first from every function. A function is
//! `Calculating` while its callees are being walked and `Known` once its
//! result is memoized; meeting a `Calculating` callee means the walk closed
//! a cycle.
//!
//! Per function the analysis yields:
//! - `call_depth`: frames on the longest call chain starting here
//! - `stack_usage`: own frame plus the deepest callee usage, in cells
//! - `recursive`: part of, or calls into, a cycle
//! - `indirect`: calls through a function value, itself or through callees
//!
//! Recursion and indirect calls make depth and usage unbounded (`None`), and
//! that propagates to every caller.

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use sable_core::{CompilationError, DeclId, Diagnostic, Severity};

use crate::decl::{DeclArena, DeclKind, FunctionFlags, FunctionInfo};
use crate::options::{CompilerOptions, RecursionPolicy};

type Result<T> = std::result::Result<T, CompilationError>;

/// Cells a call adds besides locals and evaluation depth: return address
/// and saved frame.
pub const FRAME_OVERHEAD: u32 = 2;

/// Analysis result of one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionUsage {
    /// Longest call chain (`None` = unbounded).
    pub call_depth: Option<u32>,
    /// Worst-case cumulative stack usage (`None` = unbounded).
    pub stack_usage: Option<u32>,
    /// Part of, or reaches, a call cycle.
    pub recursive: bool,
    /// Reaches a call through a function value.
    pub indirect: bool,
}

impl FunctionUsage {
    /// Bounded usage of a call that needs no bytecode frame of its own.
    const HOST: FunctionUsage = FunctionUsage {
        call_depth: Some(0),
        stack_usage: Some(0),
        recursive: false,
        indirect: false,
    };
}

/// Worst case over a group of functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    /// Functions in the group.
    pub functions: usize,
    /// Deepest call chain (`None` if any member is unbounded).
    pub max_call_depth: Option<u32>,
    /// Highest stack usage (`None` if any member is unbounded).
    pub max_stack_usage: Option<u32>,
}

impl UsageSummary {
    fn of<'u>(usages: impl Iterator<Item = &'u FunctionUsage>) -> Self {
        let mut summary = UsageSummary {
            functions: 0,
            max_call_depth: Some(0),
            max_stack_usage: Some(0),
        };
        for usage in usages {
            summary.functions += 1;
            summary.max_call_depth = max_bounded(summary.max_call_depth, usage.call_depth);
            summary.max_stack_usage = max_bounded(summary.max_stack_usage, usage.stack_usage);
        }
        summary
    }
}

/// Outcome of analyzing a module.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Summary over exported entry points.
    pub exported: UsageSummary,
    /// Summary over every function.
    pub all: UsageSummary,
    /// Recursion and unbounded-usage warnings allowed by the options.
    pub warnings: Vec<Diagnostic>,
}

/// Per-function results of a call graph walk.
#[derive(Debug, Clone, Default)]
pub struct CallGraphResult {
    /// Result of every function, hosted ones included.
    pub usages: FxHashMap<DeclId, FunctionUsage>,
    /// Functions whose own call closed a cycle, in discovery order.
    pub cycle_heads: Vec<DeclId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Calculating,
    Known,
}

/// Computes call depth and stack usage over a module's call graph.
pub struct StackAnalyzer<'a> {
    decls: &'a DeclArena,
    graph: DiGraph<DeclId, ()>,
    nodes: FxHashMap<DeclId, NodeIndex>,
    visits: Vec<Option<Visit>>,
    results: Vec<Option<FunctionUsage>>,
    /// Functions whose own call closed a cycle, in discovery order
    cycles: Vec<DeclId>,
}

impl<'a> StackAnalyzer<'a> {
    /// Build the call graph of every function in `decls`.
    pub fn new(decls: &'a DeclArena) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = FxHashMap::default();

        for (id, decl) in decls.iter() {
            if decl.kind.is_callable() {
                nodes.insert(id, graph.add_node(id));
            }
        }
        for (id, decl) in decls.iter() {
            let (DeclKind::Function(info) | DeclKind::Forward(info)) = &decl.kind else {
                continue;
            };
            let Some(&caller) = nodes.get(&id) else {
                continue;
            };
            for callee in &info.callees {
                if let Some(&target) = nodes.get(callee) {
                    graph.add_edge(caller, target, ());
                }
            }
        }

        let count = graph.node_count();
        Self {
            decls,
            graph,
            nodes,
            visits: vec![None; count],
            results: vec![None; count],
            cycles: Vec::new(),
        }
    }

    /// Analyze every function.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> Result<CallGraphResult> {
        let roots: Vec<NodeIndex> = self.graph.node_indices().collect();
        for root in roots {
            self.visit(root)?;
        }

        let mut usages = FxHashMap::default();
        for (&id, &node) in &self.nodes {
            if let Some(usage) = self.results[node.index()] {
                usages.insert(id, usage);
            }
        }
        Ok(CallGraphResult {
            usages,
            cycle_heads: self.cycles,
        })
    }

    /// Iterative depth-first walk from `root`, memoizing every function it
    /// finishes.
    fn visit(&mut self, root: NodeIndex) -> Result<()> {
        if self.visits[root.index()].is_some() {
            return Ok(());
        }

        self.visits[root.index()] = Some(Visit::Calculating);
        let mut stack = vec![(root, self.callees(root))];

        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(callee) => {
                    if self.visits[callee.index()].is_none() {
                        self.visits[callee.index()] = Some(Visit::Calculating);
                        let callees = self.callees(callee);
                        stack.push((callee, callees));
                    }
                }
                None => {
                    stack.pop();
                    let usage = self.finish(node)?;
                    self.results[node.index()] = Some(usage);
                    self.visits[node.index()] = Some(Visit::Known);
                }
            }
        }
        Ok(())
    }

    fn callees(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors(node).collect()
    }

    /// Combine a function's own frame with its callees' results. Every
    /// callee is `Known` or still `Calculating` (a cycle) at this point.
    fn finish(&mut self, node: NodeIndex) -> Result<FunctionUsage> {
        let decls = self.decls;
        let id = self.graph[node];
        let decl = decls.expect(id)?;
        let info = match &decl.kind {
            DeclKind::Function(info) | DeclKind::Forward(info) => info,
            DeclKind::External(host) => {
                return Ok(FunctionUsage {
                    call_depth: Some(1),
                    stack_usage: host.stack_usage,
                    ..FunctionUsage::HOST
                });
            }
            DeclKind::Native(_) => return Ok(FunctionUsage::HOST),
            other => {
                return Err(CompilationError::internal(format!(
                    "{} '{}' in the call graph",
                    other.describe(),
                    decl.name
                )));
            }
        };

        let mut recursive = false;
        let mut closes_cycle = false;
        let mut indirect = info.flags.contains(FunctionFlags::CALLS_INDIRECTLY);
        let mut deepest_call = Some(0);
        let mut deepest_usage = Some(0);

        for callee in self.graph.neighbors(node) {
            match (self.visits[callee.index()], self.results[callee.index()]) {
                (Some(Visit::Known), Some(usage)) => {
                    recursive |= usage.recursive;
                    indirect |= usage.indirect;
                    deepest_call = max_bounded(deepest_call, usage.call_depth);
                    deepest_usage = max_bounded(deepest_usage, usage.stack_usage);
                }
                _ => {
                    recursive = true;
                    closes_cycle = true;
                }
            }
        }
        if closes_cycle {
            self.cycles.push(id);
        }

        let bounded = !recursive && !indirect;
        let usage = FunctionUsage {
            call_depth: deepest_call.filter(|_| bounded).map(|depth| depth + 1),
            stack_usage: deepest_usage
                .filter(|_| bounded)
                .map(|callee| frame_size(info) + callee),
            recursive,
            indirect,
        };
        log::trace!("'{}': {:?}", decl.name, usage);
        Ok(usage)
    }
}

/// Own frame of a function in cells.
pub fn frame_size(info: &FunctionInfo) -> u32 {
    FRAME_OVERHEAD + info.local_count as u32 + info.max_eval_depth
}

fn max_bounded(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    Some(a?.max(b?))
}

/// Analyze the module, store the results on every function and enforce the
/// recursion and stack policies of `options`.
pub fn analyze(decls: &mut DeclArena, options: &CompilerOptions) -> Result<AnalysisReport> {
    let CallGraphResult {
        usages,
        mut cycle_heads,
    } = StackAnalyzer::new(decls).run()?;
    cycle_heads.sort_unstable();
    let mut report = AnalysisReport::default();

    for &id in &cycle_heads {
        let decl = decls.expect(id)?;
        match options.recursion {
            RecursionPolicy::Reject => {
                return Err(CompilationError::RecursionRejected {
                    name: decl.name.clone(),
                    span: decl.span,
                });
            }
            RecursionPolicy::Warn => report.warnings.push(Diagnostic::new(
                Severity::Warning,
                decl.span,
                format!("'{}' is recursive; its stack usage is unbounded", decl.name),
            )),
        }
    }

    let mut functions: Vec<(DeclId, FunctionUsage)> = usages
        .into_iter()
        .filter(|(id, _)| decls.function(*id).is_some())
        .collect();
    functions.sort_unstable_by_key(|(id, _)| *id);

    for (id, usage) in &functions {
        let decl = decls.expect(*id)?;
        let calls_indirectly = decls
            .function(*id)
            .is_some_and(|info| info.flags.contains(FunctionFlags::CALLS_INDIRECTLY));

        if let Some(limit) = options.max_stack_usage {
            let exceeded = match usage.stack_usage {
                Some(cells) => cells > limit,
                None => true,
            };
            if exceeded {
                return Err(CompilationError::StackLimitExceeded {
                    name: decl.name.clone(),
                    usage: usage
                        .stack_usage
                        .map_or_else(|| "unbounded".to_string(), |cells| cells.to_string()),
                    limit,
                    span: decl.span,
                });
            }
        } else if calls_indirectly {
            report.warnings.push(Diagnostic::new(
                Severity::Warning,
                decl.span,
                format!("'{}' calls through a function value; its stack usage is unbounded", decl.name),
            ));
        }
    }

    for (id, usage) in &functions {
        if let Some(info) = decls.function_mut(*id) {
            info.call_depth = usage.call_depth;
            info.stack_usage = usage.stack_usage;
            info.flags.set(FunctionFlags::RECURSIVE, usage.recursive);
            info.flags.set(FunctionFlags::REACHES_INDIRECT, usage.indirect);
            info.flags.set(
                FunctionFlags::DEPTH_KNOWN,
                usage.call_depth.is_some() && usage.stack_usage.is_some(),
            );
        }
    }

    report.all = UsageSummary::of(functions.iter().map(|(_, usage)| usage));
    report.exported = UsageSummary::of(
        functions
            .iter()
            .filter(|(id, _)| {
                decls
                    .function(*id)
                    .is_some_and(|info| info.flags.contains(FunctionFlags::EXPORTED))
            })
            .map(|(_, usage)| usage),
    );
    log::debug!(
        "stack analysis: {} function(s), max usage {:?}, {} warning(s)",
        report.all.functions,
        report.all.max_stack_usage,
        report.warnings.len()
    );
    Ok(report)
}
