//! `omr models`: list and inspect models.

use std::collections::BTreeMap;

use model_registry::resolver::resolve_model_id;
use model_registry::{CapabilityFlags, ModelDefinition, ParameterConstraint};
use serde::Serialize;
use serde_json::Value;

use crate::args::GetArgs;
use crate::context::Context;
use crate::error::CliError;
use crate::output::{cell, emit, Report, Table};

#[derive(Debug, Serialize)]
struct ModelSummary {
    model: String,
    aliases: Vec<String>,
    context_window: u64,
    max_output_tokens: u64,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sunsets_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replacement: Option<String>,
}

fn to_value<T: Serialize>(ctx: &Context, v: &T) -> Result<Value, CliError> {
    serde_json::to_value(v).map_err(|e| CliError::Render {
        format: ctx.format.name(),
        message: e.to_string(),
    })
}

pub fn list(ctx: &Context, filter: Option<&str>) -> Result<(), CliError> {
    let registry = ctx.registry()?;
    let mut aliases_by_target: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (alias, target) in registry.list_aliases() {
        aliases_by_target.entry(target).or_default().push(alias);
    }
    let needle = filter.map(str::to_lowercase);

    let mut summaries = Vec::new();
    for id in registry.list_models() {
        let aliases = aliases_by_target.remove(&id).unwrap_or_default();
        if let Some(needle) = &needle {
            let hit = std::iter::once(&id)
                .chain(aliases.iter())
                .any(|name| name.to_lowercase().contains(needle.as_str()));
            if !hit {
                continue;
            }
        }
        let capability = registry.get_capabilities_for(&id, ctx.provider())?;
        let deprecation = capability.deprecation();
        summaries.push(ModelSummary {
            context_window: capability.context_window(),
            max_output_tokens: capability.max_output_tokens(),
            status: deprecation.status.to_string(),
            sunsets_on: deprecation.sunsets_on.map(|d| d.to_string()),
            replacement: deprecation.replacement.clone(),
            model: id,
            aliases,
        });
    }

    let mut table = Table::new(["MODEL", "ALIASES", "CONTEXT", "MAX OUTPUT", "STATUS"]);
    for s in &summaries {
        table.push(vec![
            s.model.clone(),
            if s.aliases.is_empty() { "-".to_string() } else { s.aliases.join(", ") },
            s.context_window.to_string(),
            s.max_output_tokens.to_string(),
            s.status.clone(),
        ]);
    }
    emit(&Report::with_table(to_value(ctx, &summaries)?, table), ctx.format, None)
}

pub fn get(ctx: &Context, args: &GetArgs) -> Result<(), CliError> {
    let registry = ctx.registry()?;
    let report = if args.view.raw {
        let definition = registry.raw_model(&args.model)?;
        let model_id = resolve_model_id(&registry.generation().data.dataset, &args.model)?;
        if args.parameters_only {
            Report::document(to_value(ctx, &definition.parameters)?)
        } else {
            let table = summary_table(&args.model, &model_id, None, &definition);
            Report::with_table(to_value(ctx, &definition)?, table)
        }
    } else {
        let capability = registry.get_capabilities_for(&args.model, ctx.provider())?;
        if args.parameters_only {
            Report::with_table(
                to_value(ctx, &capability.parameters)?,
                parameters_table(&capability.parameters),
            )
        } else {
            let table = summary_table(
                &capability.requested_name,
                &capability.model_id,
                Some(&capability.provider),
                &capability.definition,
            );
            Report::with_table(to_value(ctx, &*capability)?, table)
        }
    };
    emit(&report, ctx.format, args.output.as_deref())
}

fn summary_table(requested: &str, model_id: &str, provider: Option<&str>, def: &ModelDefinition) -> Table {
    let deprecation = &def.deprecation;
    let mut pairs: Vec<(&str, String)> = vec![("model", model_id.to_string())];
    if requested != model_id {
        pairs.push(("requested", requested.to_string()));
    }
    pairs.push(("provider", provider.unwrap_or("(raw)").to_string()));
    pairs.push(("context window", def.context_window.to_string()));
    pairs.push(("max output tokens", def.max_output_tokens.to_string()));
    pairs.push(("status", deprecation.status.to_string()));
    pairs.push(("deprecates on", cell(deprecation.deprecates_on)));
    pairs.push(("sunsets on", cell(deprecation.sunsets_on)));
    pairs.push(("replacement", cell(deprecation.replacement.as_ref())));
    if let Some(pricing) = &def.pricing {
        pairs.push((
            "pricing",
            format!(
                "in {} / out {} {} per {}",
                pricing.input_cost_per_unit,
                pricing.output_cost_per_unit,
                pricing.currency,
                serde_label(&pricing.unit),
            ),
        ));
    }
    pairs.push(("capabilities", capability_names(&def.capabilities)));
    pairs.push((
        "input modalities",
        def.input_modalities.iter().map(serde_label).collect::<Vec<_>>().join(", "),
    ));
    pairs.push(("parameters", def.parameters.keys().cloned().collect::<Vec<_>>().join(", ")));
    Table::key_value(pairs)
}

/// The snake_case name serde gives a unit variant.
fn serde_label<T: Serialize>(v: &T) -> String {
    match serde_json::to_value(v) {
        Ok(Value::String(s)) => s,
        _ => "?".to_string(),
    }
}

fn capability_names(flags: &CapabilityFlags) -> String {
    let named = [
        ("streaming", flags.supports_streaming),
        ("structured_output", flags.supports_structured_output),
        ("web_search", flags.supports_web_search),
        ("vision", flags.supports_vision),
        ("function_calling", flags.supports_function_calling),
        ("json_mode", flags.supports_json_mode),
        ("audio", flags.supports_audio),
    ];
    let on: Vec<&str> = named.iter().filter(|(_, set)| *set).map(|(n, _)| *n).collect();
    if on.is_empty() {
        "-".to_string()
    } else {
        on.join(", ")
    }
}

fn parameters_table(parameters: &BTreeMap<String, ParameterConstraint>) -> Table {
    let mut table = Table::new(["PARAMETER", "TYPE", "RULE", "DESCRIPTION"]);
    for (name, constraint) in parameters {
        table.push(vec![
            name.clone(),
            constraint.kind().to_string(),
            rule(constraint),
            constraint.description().to_string(),
        ]);
    }
    table
}

fn rule(constraint: &ParameterConstraint) -> String {
    match constraint {
        ParameterConstraint::Numeric(c) => {
            let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
            let mut out = format!("{}..{}", bound(c.min), bound(c.max));
            if !c.allow_float {
                out.push_str(" integer");
            } else if !c.allow_int {
                out.push_str(" float");
            }
            out
        }
        ParameterConstraint::Enum(c) => c.allowed_values.join("|"),
        ParameterConstraint::Object(c) => {
            let mut parts = Vec::new();
            if !c.required_keys.is_empty() {
                parts.push(format!("required: {}", c.required_keys.join(",")));
            }
            if let Some(allowed) = &c.allowed_keys {
                parts.push(format!("allowed: {}", allowed.join(",")));
            }
            if parts.is_empty() {
                "any object".to_string()
            } else {
                parts.join("; ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_registry::{EnumConstraint, NumericConstraint, ObjectConstraint};

    #[test]
    fn rules_read_compactly() {
        let temp = ParameterConstraint::Numeric(NumericConstraint::new(Some(0.0), Some(2.0)));
        assert_eq!(rule(&temp), "0..2");
        let tokens = ParameterConstraint::Numeric(
            NumericConstraint::new(Some(1.0), None).with_allow_float(false),
        );
        assert_eq!(rule(&tokens), "1.. integer");
        let effort = ParameterConstraint::Enum(EnumConstraint {
            allowed_values: vec!["low".into(), "high".into()],
            description: String::new(),
        });
        assert_eq!(rule(&effort), "low|high");
        let format = ParameterConstraint::Object(ObjectConstraint {
            required_keys: vec!["type".into()],
            allowed_keys: None,
            description: String::new(),
        });
        assert_eq!(rule(&format), "required: type");
    }

    #[test]
    fn capability_names_lists_set_flags() {
        let flags = CapabilityFlags {
            supports_streaming: true,
            supports_vision: true,
            ..CapabilityFlags::default()
        };
        assert_eq!(capability_names(&flags), "streaming, vision");
        assert_eq!(capability_names(&CapabilityFlags::default()), "-");
    }
}
