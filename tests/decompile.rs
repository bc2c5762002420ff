//! End-to-end decompilation of hand-assembled method bytecode.

use classfile_decompiler::code_attribute::ExceptionEntry;
use classfile_decompiler::decompile::resolver::{
    BootstrapArgument, BootstrapInfo, HandleKind, MethodHandle, PoolEntry, PoolLiteral,
};
use classfile_decompiler::{
    DecompileError, DecompileOptions, Decompiler, FunctionContext, MethodSource, RenderConfig, TableResolver,
};
use pretty_assertions::assert_eq;

const CLASS: &str = "com/example/Counter";

fn method(name: &str, descriptor: &str, is_static: bool, code: &[u8]) -> MethodSource {
    let context = FunctionContext::new(CLASS, name, descriptor, is_static).unwrap();
    MethodSource::new(context, code.to_vec(), Vec::new())
}

fn println_resolver() -> TableResolver {
    TableResolver::new()
        .with_entry(
            2,
            PoolEntry::Field {
                owner: "java/lang/System".into(),
                name: "out".into(),
                descriptor: "Ljava/io/PrintStream;".into(),
            },
        )
        .with_literal(3, PoolLiteral::String("hi".into()))
        .with_entry(
            4,
            PoolEntry::Method {
                owner: "java/io/PrintStream".into(),
                name: "println".into(),
                descriptor: "(Ljava/lang/String;)V".into(),
            },
        )
}

/// Static methods of the class under test, by pool index.
fn calls(entries: &[(u16, &str, &str)]) -> TableResolver {
    entries.iter().fold(TableResolver::new(), |resolver, &(index, name, descriptor)| {
        resolver.with_entry(
            index,
            PoolEntry::Method {
                owner: CLASS.into(),
                name: name.into(),
                descriptor: descriptor.into(),
            },
        )
    })
}

fn decompile(resolver: &TableResolver, source: &MethodSource) -> String {
    Decompiler::new(resolver).decompile_to_string(source).unwrap()
}

#[test]
fn test_early_return() {
    // 0: iload_0; 1: ifle -> 6; 4: iconst_1; 5: ireturn; 6: iconst_m1; 7: ireturn
    let source = method("sign", "(I)I", true, &[0x1a, 0x9e, 0x00, 0x05, 0x04, 0xac, 0x02, 0xac]);
    assert_eq!(
        decompile(&TableResolver::new(), &source),
        "if (var0 > 0){\n    return 1;\n}\nreturn -1;"
    );
}

#[test]
fn test_boolean_result_collapses() {
    // 0: iload_0; 1: ifle -> 8; 4: iconst_1; 5: goto -> 9; 8: iconst_0; 9: ireturn
    let code = [0x1a, 0x9e, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x03, 0xac];
    let source = method("isPositive", "(I)Z", true, &code);
    assert_eq!(decompile(&TableResolver::new(), &source), "return var0 > 0;");
}

#[test]
fn test_counting_loop() {
    // int sum = 0; for (int i = 0; i < n; i++) sum += i; return sum;
    let code = [
        0x03, 0x3c, // 0: iconst_0; istore_1
        0x03, 0x3d, // 2: iconst_0; istore_2
        0x1c, 0x1a, // 4: iload_2; iload_0
        0xa2, 0x00, 0x0d, // 6: if_icmpge -> 19
        0x1b, 0x1c, 0x60, 0x3c, // 9: iload_1; iload_2; iadd; istore_1
        0x84, 0x02, 0x01, // 13: iinc 2, 1
        0xa7, 0xff, 0xf4, // 16: goto -> 4
        0x1b, 0xac, // 19: iload_1; ireturn
    ];
    let source = method("sum", "(I)I", true, &code);
    assert_eq!(
        decompile(&TableResolver::new(), &source),
        "int var1 = 0;\nint var2 = 0;\nwhile (var2 < var0){\n    var1 = var1 + var2;\n    var2++;\n}\nreturn var1;"
    );
}

#[test]
fn test_field_update_on_this() {
    // aload_0; aload_0; getfield #2; iload_1; iadd; putfield #2; return
    let resolver = TableResolver::new().with_entry(
        2,
        PoolEntry::Field {
            owner: CLASS.into(),
            name: "count".into(),
            descriptor: "I".into(),
        },
    );
    let code = [0x2a, 0x2a, 0xb4, 0x00, 0x02, 0x1b, 0x60, 0xb5, 0x00, 0x02, 0xb1];
    let decompiler = Decompiler::new(&resolver);
    let decompiled = decompiler.decompile_method(&method("add", "(I)V", false, &code)).unwrap();
    assert_eq!(decompiled.param_names(), vec!["var0".to_string()]);
    assert_eq!(
        decompiled.render(&RenderConfig::default()),
        "this.count = this.count + var0;\nreturn;"
    );
}

#[test]
fn test_static_call_with_string_literal() {
    // getstatic #2; ldc #3; invokevirtual #4; return
    let code = [0xb2, 0x00, 0x02, 0x12, 0x03, 0xb6, 0x00, 0x04, 0xb1];
    let source = method("greet", "()V", true, &code);
    let resolver = println_resolver();
    assert_eq!(decompile(&resolver, &source), "System.out.println(\"hi\");\nreturn;");

    let options = DecompileOptions {
        render: RenderConfig::compact(),
        ..DecompileOptions::default()
    };
    let compact = Decompiler::with_options(&resolver, options).decompile_to_string(&source).unwrap();
    assert_eq!(compact, "System.out.println(\"hi\")\nreturn");
}

#[test]
fn test_try_catch_from_exception_table() {
    let resolver = TableResolver::new()
        .with_entry(
            2,
            PoolEntry::Method {
                owner: CLASS.into(),
                name: "work".into(),
                descriptor: "()V".into(),
            },
        )
        .with_entry(
            3,
            PoolEntry::Method {
                owner: CLASS.into(),
                name: "report".into(),
                descriptor: "()V".into(),
            },
        )
        .with_entry(4, PoolEntry::Class("java/io/IOException".into()));
    // 0: invokestatic #2; 3: goto -> 10; 6: astore_0; 7: invokestatic #3; 10: return
    let code = [0xb8, 0x00, 0x02, 0xa7, 0x00, 0x07, 0x4b, 0xb8, 0x00, 0x03, 0xb1];
    let context = FunctionContext::new(CLASS, "guarded", "()V", true).unwrap();
    let table = vec![ExceptionEntry {
        start_pc: 0,
        end_pc: 3,
        handler_pc: 6,
        catch_type: 4,
    }];
    let source = MethodSource::new(context, code.to_vec(), table);
    assert_eq!(
        decompile(&resolver, &source),
        "try{\n    Counter.work();\n}catch (IOException var0){\n    Counter.report();\n}\nreturn;"
    );
}

#[test]
fn test_code_after_try_is_not_protected() {
    let resolver = calls(&[(5, "g", "()V"), (6, "h", "()V")]);
    // 0: invokestatic #5; 3: goto -> 9; 6: astore_0; 7: aload_0; 8: athrow;
    // 9: invokestatic #6; 12: return
    let code = [0xb8, 0x00, 0x05, 0xa7, 0x00, 0x06, 0x4b, 0x2a, 0xbf, 0xb8, 0x00, 0x06, 0xb1];
    let context = FunctionContext::new(CLASS, "guarded", "()V", true).unwrap();
    let table = vec![ExceptionEntry {
        start_pc: 0,
        end_pc: 3,
        handler_pc: 6,
        catch_type: 0,
    }];
    let source = MethodSource::new(context, code.to_vec(), table);
    assert_eq!(
        decompile(&resolver, &source),
        "try{\n    Counter.g();\n}catch (Throwable var0){\n    throw var0;\n}\nCounter.h();\nreturn;"
    );
}

#[test]
fn test_synchronized_block_followed_by_call() {
    // synchronized (o) { g(); } h(); return;
    let resolver = calls(&[(2, "g", "()V"), (3, "h", "()V")]);
    let code = [
        0x2a, 0x59, 0x4c, 0xc2, // 0: aload_0; dup; astore_1; monitorenter
        0xb8, 0x00, 0x02, // 4: invokestatic #2
        0x2b, 0xc3, // 7: aload_1; monitorexit
        0xa7, 0x00, 0x08, // 9: goto -> 17
        0x4d, 0x2b, 0xc3, 0x2c, 0xbf, // 12: astore_2; aload_1; monitorexit; aload_2; athrow
        0xb8, 0x00, 0x03, // 17: invokestatic #3
        0xb1, // 20: return
    ];
    let context = FunctionContext::new(CLASS, "locked", "(Ljava/lang/Object;)V", true).unwrap();
    let table = vec![
        ExceptionEntry {
            start_pc: 4,
            end_pc: 9,
            handler_pc: 12,
            catch_type: 0,
        },
        ExceptionEntry {
            start_pc: 12,
            end_pc: 15,
            handler_pc: 12,
            catch_type: 0,
        },
    ];
    let source = MethodSource::new(context, code.to_vec(), table);
    assert_eq!(
        decompile(&resolver, &source),
        "synchronized (var0){\n    Counter.g();\n}\nCounter.h();\nreturn;"
    );
}

#[test]
fn test_duplicated_call_runs_once() {
    // invokestatic #2; dup; istore_0; istore_1; iload_0; iload_1; iadd; ireturn
    let resolver = calls(&[(2, "g", "()I")]);
    let code = [0xb8, 0x00, 0x02, 0x59, 0x3b, 0x3c, 0x1a, 0x1b, 0x60, 0xac];
    let source = method("twice", "()I", true, &code);
    assert_eq!(
        decompile(&resolver, &source),
        "int var0 = Counter.g();\nint var1 = var0;\nint var2 = var0;\nreturn var1 + var2;"
    );
}

#[test]
fn test_switch_with_returning_case() {
    // switch (x) { case 1: return; case 2: a(); break; default: b(); } c(); return;
    let resolver = calls(&[(2, "a", "()V"), (3, "b", "()V"), (4, "c", "()V")]);
    let code = [
        0x1a, // 0: iload_0
        0xab, 0x00, 0x00, // 1: lookupswitch, padded to 4
        0x00, 0x00, 0x00, 0x22, // default -> 35
        0x00, 0x00, 0x00, 0x02, // two pairs
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x1b, // 1 -> 28
        0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x1c, // 2 -> 29
        0xb1, // 28: return
        0xb8, 0x00, 0x02, // 29: invokestatic #2
        0xa7, 0x00, 0x06, // 32: goto -> 38
        0xb8, 0x00, 0x03, // 35: invokestatic #3
        0xb8, 0x00, 0x04, // 38: invokestatic #4
        0xb1, // 41: return
    ];
    let source = method("dispatch", "(I)V", true, &code);
    assert_eq!(
        decompile(&resolver, &source),
        "switch (var0){\n    case 1:\n        return;\n    case 2:\n        Counter.a();\n        break;\n    default:\n        Counter.b();\n}\nCounter.c();\nreturn;"
    );
}

#[test]
fn test_stack_read_survives_local_write() {
    let resolver = TableResolver::new();
    // iload_0; iinc 0, 1; ireturn
    let increment = method("postIncrement", "(I)I", true, &[0x1a, 0x84, 0x00, 0x01, 0xac]);
    assert_eq!(
        decompile(&resolver, &increment),
        "int var1 = var0;\nvar0++;\nreturn var1;"
    );
    // iload_0; iconst_5; istore_0; ireturn
    let store = method("swapIn", "(I)I", true, &[0x1a, 0x08, 0x3b, 0xac]);
    assert_eq!(
        decompile(&resolver, &store),
        "int var1 = var0;\nvar0 = 5;\nreturn var1;"
    );
}

#[test]
fn test_goto_to_itself_is_an_empty_loop() {
    let source = method("spin", "()V", true, &[0xa7, 0x00, 0x00]);
    assert_eq!(decompile(&TableResolver::new(), &source), "do{\n\n}while(true);");
}

#[test]
fn test_lambda_body_is_inlined() {
    let lambda_code = [0xb2, 0x00, 0x02, 0x12, 0x03, 0xb6, 0x00, 0x04, 0xb1];
    let resolver = println_resolver()
        .with_dynamic(
            5,
            BootstrapInfo {
                bootstrap_owner: "java/lang/invoke/LambdaMetafactory".into(),
                bootstrap_name: "metafactory".into(),
                name: "run".into(),
                descriptor: "()Ljava/lang/Runnable;".into(),
                arguments: vec![
                    BootstrapArgument::MethodType("()V".into()),
                    BootstrapArgument::MethodHandle(MethodHandle {
                        kind: HandleKind::InvokeStatic,
                        owner: CLASS.into(),
                        name: "lambda$make$0".into(),
                        descriptor: "()V".into(),
                    }),
                    BootstrapArgument::MethodType("()V".into()),
                ],
            },
        )
        .with_method(method("lambda$make$0", "()V", true, &lambda_code));
    // invokedynamic #5; areturn
    let source = method("make", "()Ljava/lang/Runnable;", true, &[0xba, 0x00, 0x05, 0x00, 0x00, 0xb0]);
    assert_eq!(
        decompile(&resolver, &source),
        "return () -> System.out.println(\"hi\");"
    );

    let options = DecompileOptions {
        inline_lambdas: false,
        ..DecompileOptions::default()
    };
    let text = Decompiler::with_options(&resolver, options).decompile_to_string(&source).unwrap();
    assert_eq!(text, "return Counter::lambda$make$0;");
}

#[test]
fn test_errors_are_per_method() {
    let resolver = TableResolver::new();
    let sources = [
        method("ok", "()V", true, &[0xb1]),
        method("unknown", "()V", true, &[0xcb]),
        method("subroutine", "()V", true, &[0xa8, 0x00, 0x03, 0xb1]),
        method("unresolved", "()V", true, &[0xb8, 0x00, 0x09, 0xb1]),
    ];
    let results = Decompiler::new(&resolver).decompile_methods(&sources);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(DecompileError::UnknownOpcode { opcode: 0xcb, .. })));
    assert!(matches!(results[2], Err(DecompileError::NotSupported { instruction: "jsr", .. })));
    assert!(matches!(results[3], Err(DecompileError::UnresolvedConstant { index: 9 })));
}
