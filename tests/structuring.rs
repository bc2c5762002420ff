//! Structuring scenarios built directly as statement graphs and checked
//! through the compact renderer.

use classfile_decompiler::decompile::rewriter::structure;
use classfile_decompiler::decompile::scoping::assign_scopes;
use classfile_decompiler::decompile::statement_graph::{NodeId, StatementGraph};
use classfile_decompiler::decompile::statements::{CaseLabel, Marker, Statement};
use classfile_decompiler::decompile::types::JavaType;
use classfile_decompiler::decompile::values::JavaValue;
use classfile_decompiler::decompile::var_id::{Symbols, VarKind};
use classfile_decompiler::{DecompileError, FunctionContext, JavaRenderer, RenderConfig};
use pretty_assertions::assert_eq;

fn text(g: &mut StatementGraph, name: &str) -> NodeId {
    g.add(Statement::custom(name))
}

fn cond(g: &mut StatementGraph, name: &str) -> NodeId {
    g.add(Statement::condition(JavaValue::custom(name)))
}

fn edges(g: &mut StatementGraph, list: &[(NodeId, NodeId)]) {
    for &(from, to) in list {
        g.link(from, to);
    }
}

fn render(body: &[Statement], symbols: &Symbols) -> String {
    let context = FunctionContext::new("com/example/Sample", "run", "()V", true).unwrap();
    JavaRenderer::new(&RenderConfig::compact(), &context, symbols).render_block(body)
}

fn structure_and_render(g: &mut StatementGraph) -> String {
    let body = structure(g).unwrap();
    assert_fully_structured(&body);
    let first = render(&body, &Symbols::new());
    assert_eq!(render(&body, &Symbols::new()), first);
    first
}

/// No branch, goto or marker survives structuring.
fn assert_fully_structured(body: &[Statement]) {
    for statement in body {
        assert!(
            !matches!(
                statement,
                Statement::Condition { .. } | Statement::Goto | Statement::Middle(_)
            ),
            "leftover {:?}",
            statement
        );
        for block in statement.blocks() {
            assert_fully_structured(block);
        }
    }
}

#[test]
fn test_if_else_with_shared_end() {
    let mut g = StatementGraph::new();
    let start = text(&mut g, "start");
    let c = cond(&mut g, "if1");
    let body1 = text(&mut g, "body1");
    let body2 = text(&mut g, "body2");
    let end = text(&mut g, "end");
    let end2 = text(&mut g, "end2");
    edges(
        &mut g,
        &[(start, c), (c, body1), (c, body2), (body1, end), (body2, end), (end, end2)],
    );
    assert_eq!(
        structure_and_render(&mut g),
        "start\nif (if1){\nbody1\n}else{\nbody2\n}\nend\nend2"
    );
}

#[test]
fn test_empty_branch_renders_empty_else() {
    let mut g = StatementGraph::new();
    let start = text(&mut g, "start");
    let c = cond(&mut g, "if1");
    let body1 = text(&mut g, "body1");
    let end = text(&mut g, "end");
    let end2 = text(&mut g, "end2");
    edges(&mut g, &[(start, c), (c, body1), (c, end), (body1, end), (end, end2)]);
    assert_eq!(
        structure_and_render(&mut g),
        "start\nif (if1){\nbody1\n}else{\n\n}\nend\nend2"
    );
}

#[test]
fn test_two_way_dispatch_with_merge() {
    let mut g = StatementGraph::new();
    let start = text(&mut g, "start");
    let c = cond(&mut g, "try");
    let try_body = text(&mut g, "tryBody1");
    let catch_body = text(&mut g, "catchBody1");
    let merge = text(&mut g, "mergeNode");
    edges(
        &mut g,
        &[(start, c), (c, try_body), (c, catch_body), (try_body, merge), (catch_body, merge)],
    );
    assert_eq!(
        structure_and_render(&mut g),
        "start\nif (try){\ntryBody1\n}else{\ncatchBody1\n}\nmergeNode"
    );
}

#[test]
fn test_switch_cases_fall_through_in_sequence() {
    let mut g = StatementGraph::new();
    let start = text(&mut g, "start");
    let switch = g.add(Statement::Middle(Marker::Switch(JavaValue::custom("v"))));
    let case1 = text(&mut g, "case1");
    let case2 = text(&mut g, "case2");
    let case3 = text(&mut g, "case3");
    let end = text(&mut g, "end");
    edges(
        &mut g,
        &[
            (start, switch),
            (switch, case1),
            (switch, case2),
            (switch, case3),
            (switch, end),
            (case1, case2),
            (case2, case3),
            (case3, end),
        ],
    );
    g.node_mut(switch).cases = vec![
        (CaseLabel::Value(1), case1),
        (CaseLabel::Value(2), case2),
        (CaseLabel::Value(3), case3),
        (CaseLabel::Default, end),
    ];
    assert_eq!(
        structure_and_render(&mut g),
        "start\nswitch (v){\ncase 1:\ncase1\ncase 2:\ncase2\ncase 3:\ncase3\ndefault:\n}\nend"
    );
}

#[test]
fn test_switch_cases_break_to_end() {
    let mut g = StatementGraph::new();
    let switch = g.add(Statement::Middle(Marker::Switch(JavaValue::custom("v"))));
    let one = text(&mut g, "one");
    let other = text(&mut g, "other");
    let end = text(&mut g, "end");
    edges(
        &mut g,
        &[(switch, one), (switch, other), (one, end), (other, end)],
    );
    g.node_mut(switch).cases = vec![
        (CaseLabel::Value(7), one),
        (CaseLabel::Value(3), one),
        (CaseLabel::Default, other),
    ];
    assert_eq!(
        structure_and_render(&mut g),
        "switch (v){\ncase 3:\ncase 7:\none\nbreak\ndefault:\nother\n}\nend"
    );
}

#[test]
fn test_do_while_with_nested_ifs_and_early_exit() {
    let mut g = StatementGraph::new();
    let start = text(&mut g, "start");
    let head = text(&mut g, "head");
    let c1 = cond(&mut g, "if1");
    let c2 = cond(&mut g, "if2");
    let tail = text(&mut g, "tail");
    let end = text(&mut g, "end");
    edges(
        &mut g,
        &[
            (start, head),
            (head, c1),
            (c1, c2),
            (c1, tail),
            (c2, head),
            (c2, end),
            (tail, head),
        ],
    );
    assert_eq!(
        structure_and_render(&mut g),
        "start\ndo{\nhead\nif (if1){\nif (!if2){\nbreak\n}\n}else{\ntail\n}\n}while(true)\nend"
    );
}

#[test]
fn test_nested_loops_label_outer_continue() {
    let mut g = StatementGraph::new();
    let start = text(&mut g, "start");
    let outer = cond(&mut g, "c");
    let outer_body = text(&mut g, "outer");
    let inner = cond(&mut g, "b");
    let z = cond(&mut g, "z");
    let a = cond(&mut g, "a");
    let x = cond(&mut g, "x");
    let step = text(&mut g, "step");
    let outer_tail = text(&mut g, "tailOuter");
    let end = text(&mut g, "end");
    edges(
        &mut g,
        &[
            (start, outer),
            (outer, outer_body),
            (outer, end),
            (outer_body, inner),
            (inner, z),
            (inner, outer_tail),
            (z, a),
            (z, step),
            (a, outer),
            (a, x),
            (x, inner),
            (x, step),
            (step, inner),
            (outer_tail, outer),
        ],
    );
    assert_eq!(
        structure_and_render(&mut g),
        "start\nLOOP_1:\nwhile (c){\nouter\nwhile (b){\nif (z){\nif (a){\ncontinue LOOP_1\n}else{\nif (x){\ncontinue\n}\n}\n}else{\n\n}\nstep\n}\ntailOuter\n}\nend"
    );
}

#[test]
fn test_try_catch_binds_exception() {
    let mut symbols = Symbols::new();
    let io = JavaType::class("java/io/IOException");
    let ty = symbols.types.alloc(io.clone());
    let e = symbols.vars.mint(1, None, ty, VarKind::Local);

    let mut g = StatementGraph::new();
    let head = g.add(Statement::Middle(Marker::TryStart(vec![io.clone()])));
    let work = text(&mut g, "work");
    let bind = g.add(Statement::Assign {
        left: JavaValue::Ref(e),
        value: JavaValue::CaughtException(io),
        declares: true,
    });
    let report = text(&mut g, "report");
    let after = g.add(Statement::Return(None));
    edges(
        &mut g,
        &[(head, work), (head, bind), (work, after), (bind, report), (report, after)],
    );

    let mut body = structure(&mut g).unwrap();
    assign_scopes(&mut body, &mut symbols, &[]);
    assert_eq!(
        render(&body, &symbols),
        "try{\nwork\n}catch (IOException var0){\nreport\n}\nreturn"
    );
}

#[test]
fn test_synchronized_pair() {
    let mut g = StatementGraph::new();
    let enter = g.add(Statement::Middle(Marker::MonitorEnter(JavaValue::custom("lock"))));
    let work = text(&mut g, "work");
    let exit = g.add(Statement::Middle(Marker::MonitorExit(JavaValue::custom("lock"))));
    let after = text(&mut g, "after");
    edges(&mut g, &[(enter, work), (work, exit), (exit, after)]);
    assert_eq!(
        structure_and_render(&mut g),
        "synchronized (lock){\nwork\n}\nafter"
    );
}

#[test]
fn test_condition_without_two_branches_is_rejected() {
    let mut g = StatementGraph::new();
    let c = cond(&mut g, "c");
    let a = text(&mut g, "a");
    g.link(c, a);
    assert!(matches!(
        structure(&mut g),
        Err(DecompileError::InvalidShape { reason: "if", .. })
    ));
}
