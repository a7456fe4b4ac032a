//! Human-readable dump of a scope info. Diagnostic only.

use super::ScopeInfo;
use super::flags::VariableAllocationInfo;
use crate::lang::scope::MIN_CONTEXT_SLOTS;
use std::fmt;

fn print_list(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    first_index: i32,
    names: impl Iterator<Item = String>,
) -> fmt::Result {
    let names: Vec<String> = names.collect();
    if names.is_empty() {
        return Ok(());
    }
    writeln!(f, "  // {}", title)?;
    for (i, name) in names.iter().enumerate() {
        writeln!(f, "  {:>4}: {}", first_index + i as i32, name)?;
    }
    Ok(())
}

impl fmt::Display for ScopeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "════════════════════════════════════════")?;
        if self.is_empty() {
            writeln!(f, " (empty scope info)")?;
            return writeln!(f, "════════════════════════════════════════");
        }

        let flags = self.flags();
        writeln!(f, " {}", flags.scope_type.name())?;
        writeln!(
            f,
            " {} slots, {:?}{}{}",
            self.len(),
            flags.language_mode,
            if flags.calls_eval { ", calls eval" } else { "" },
            if flags.is_declaration_scope { ", declaration scope" } else { "" },
        )?;
        writeln!(f, "════════════════════════════════════════")?;

        print_list(
            f,
            "parameters",
            0,
            (0..self.parameter_count()).map(|i| self.parameter_name(i).to_string()),
        )?;
        print_list(
            f,
            "stack slots",
            self.stack_local_first_slot(),
            (0..self.stack_local_count()).map(|i| self.stack_local_name(i).to_string()),
        )?;
        print_list(
            f,
            "context slots",
            MIN_CONTEXT_SLOTS,
            (0..self.context_local_count()).map(|i| {
                format!("{} ({:?})", self.context_local_name(i), self.context_local_mode(i))
            }),
        )?;

        if let Some(index) = self.receiver_index() {
            writeln!(f, "  // receiver: {:?} {}", flags.receiver, index)?;
        }
        if let Some(name) = self.function_name() {
            let location = match flags.function_name {
                VariableAllocationInfo::Context => "context",
                _ => "stack",
            };
            writeln!(f, "  // function name: {} ({})", name, location)?;
        }
        if let Some(module_info) = self.module_info() {
            writeln!(
                f,
                "  // module: {} variables, {} regular exports, {} special exports",
                self.module_variable_count(),
                module_info.regular_exports().len(),
                module_info.special_exports().len()
            )?;
            for i in 0..self.module_variable_count() {
                let (name, index, info) = self.module_variable(i);
                writeln!(f, "  {:>4}: {} ({:?})", index, name, info.mode)?;
            }
        }
        if self.has_context() {
            writeln!(f, "  // context length: {}", self.context_length())?;
        }
        Ok(())
    }
}

impl ScopeInfo {
    pub fn print(&self) {
        print!("{}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::name::NameTable;
    use crate::lang::scope::{FunctionKind, Scope, VariableMode};

    #[test]
    fn test_print_lists_sections() {
        let names = NameTable::new();
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        scope.declare_parameter(names.intern("a"));
        let c = scope.declare_local(names.intern("c"), VariableMode::Let);
        scope.declare_local(names.intern("b"), VariableMode::Var);
        scope.variable_mut(c).force_context_allocation();
        scope.allocate_variables(0);

        let text = ScopeInfo::create(&scope).to_string();
        assert!(text.contains("FUNCTION_SCOPE"));
        assert!(text.contains("// parameters"));
        assert!(text.contains("     0: b"));
        assert!(text.contains("     4: c (Let)"));
        assert!(text.contains("context length: 5"));
    }

    #[test]
    fn test_print_empty() {
        assert!(ScopeInfo::empty().to_string().contains("empty scope info"));
    }
}
