use super::parser::{BinOp, Node};
use super::{Context, Value};
use crate::error::{OrdoError, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub(super) fn eval(node: &Node, ctx: &mut Context<'_>) -> Result<Value> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Name(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| OrdoError::evaluation(format!("unknown name '{}'", name))),
        Node::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for it in items {
                out.push(eval(it, ctx)?);
            }
            Ok(Value::List(out))
        }
        Node::Member(base, field) => match eval(base, ctx)? {
            Value::Map(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => Err(OrdoError::evaluation(format!(
                "cannot read field '{}' of {}",
                field,
                other.type_name()
            ))),
        },
        Node::Index(base, idx) => {
            let base = eval(base, ctx)?;
            let idx = eval(idx, ctx)?;
            match (base, idx) {
                (Value::List(items), Value::Int(i)) => Ok(usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Null)),
                (Value::Map(map), Value::Text(k)) => Ok(map.get(&k).cloned().unwrap_or(Value::Null)),
                (b, i) => Err(OrdoError::evaluation(format!(
                    "cannot index {} with {}",
                    b.type_name(),
                    i.type_name()
                ))),
            }
        }
        Node::Call { name, args, named } => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval(a, ctx)?);
            }
            let mut kw = BTreeMap::new();
            for (k, n) in named {
                kw.insert(k.clone(), eval(n, ctx)?);
            }
            ctx.call(name, values, kw)
        }
        Node::Not(inner) => Ok(Value::Bool(!boolean(eval(inner, ctx)?, "!")?)),
        Node::Neg(inner) => match eval(inner, ctx)? {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| OrdoError::evaluation("integer overflow")),
            other => Err(OrdoError::evaluation(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
        Node::Ternary(cond, then, otherwise) => {
            if boolean(eval(cond, ctx)?, "?:")? {
                eval(then, ctx)
            } else {
                eval(otherwise, ctx)
            }
        }
        Node::Binary(BinOp::And, lhs, rhs) => {
            if !boolean(eval(lhs, ctx)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(boolean(eval(rhs, ctx)?, "&&")?))
        }
        Node::Binary(BinOp::Or, lhs, rhs) => {
            if boolean(eval(lhs, ctx)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(boolean(eval(rhs, ctx)?, "||")?))
        }
        Node::Binary(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            binary(*op, l, r)
        }
    }
}

fn boolean(v: Value, op: &str) -> Result<bool> {
    v.as_bool().ok_or_else(|| {
        OrdoError::evaluation(format!(
            "operator '{}' expects boolean, got {}",
            op,
            v.type_name()
        ))
    })
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(loosely_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!loosely_equal(&l, &r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = compare(&l, &r)?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Le => ord != Ordering::Greater,
                BinOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(b)
                .map(Value::Int)
                .ok_or_else(|| OrdoError::evaluation("integer overflow")),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (Value::List(mut a), other) => {
                a.push(other);
                Ok(Value::List(a))
            }
            (Value::Text(a), other) => Ok(Value::Text(format!("{}{}", a, other))),
            (other, Value::Text(b)) => Ok(Value::Text(format!("{}{}", other, b))),
            (a, b) => Err(OrdoError::evaluation(format!(
                "cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        BinOp::Sub => match (l, r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(b)
                .map(Value::Int)
                .ok_or_else(|| OrdoError::evaluation("integer overflow")),
            (a, b) => Err(OrdoError::evaluation(format!(
                "cannot subtract {} from {}",
                b.type_name(),
                a.type_name()
            ))),
        },
        BinOp::And | BinOp::Or => Err(OrdoError::evaluation("logical operator outside short-circuit evaluation")),
    }
}

/// Structural equality, except integers compare equal to text spelling
/// the same number (directive parameters arrive as either).
fn loosely_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Text(b)) | (Value::Text(b), Value::Int(a)) => {
            b.trim().parse::<i64>().map(|b| b == *a).unwrap_or(false)
        }
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> Result<Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (Value::Int(_), Value::Text(_)) | (Value::Text(_), Value::Int(_)) => {
            match (l.as_int(), r.as_int()) {
                (Some(a), Some(b)) => Ok(a.cmp(&b)),
                _ => Err(OrdoError::evaluation("cannot compare integer with non-numeric text")),
            }
        }
        (a, b) => Err(OrdoError::evaluation(format!(
            "cannot compare {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}
