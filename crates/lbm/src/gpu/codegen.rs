//! WGSL kernel generation.
//!
//! The compute kernels are specialized from the templates in `shaders/` by
//! plain text substitution: the direction-dependent gather, moments,
//! equilibrium and write-back code is emitted from a [`Descriptor`]'s
//! constants, and the caller's boundary fragment is passed through
//! verbatim. Only placeholder resolution is validated, never fragment
//! semantics; the fragment's contract is to branch solely on the material
//! tag `m` and to touch only `rho`, `u_0`, `u_1` (and `u_2` in 3-D), with
//! `time` in scope for ramped forcing.

use crate::descriptor::Descriptor;
use crate::{Error, Result};

const COLLIDE_STREAM_TEMPLATE: &str = include_str!("shaders/collide_stream.wgsl");
const MOMENTS_TEMPLATE: &str = include_str!("shaders/moments.wgsl");

/// Full WGSL source of the collide-and-stream kernel for a descriptor and
/// boundary fragment.
pub fn collide_stream_source<D: Descriptor>(boundary: &str) -> Result<String> {
    substitute(
        COLLIDE_STREAM_TEMPLATE,
        &[
            ("gather", emit_streaming_gather::<D>("f_prev")),
            ("moments", emit_moments::<D>()),
            ("boundary", indent(boundary, "    ")),
            ("collide", emit_collide::<D>()),
        ],
    )
}

/// Full WGSL source of the moments reduction kernel for a descriptor.
pub fn moments_source<D: Descriptor>() -> Result<String> {
    substitute(
        MOMENTS_TEMPLATE,
        &[
            ("gather", emit_local_gather::<D>("f_curr")),
            ("moments", emit_moments::<D>()),
            ("store", emit_moments_store::<D>()),
        ],
    )
}

/// Replace every `{{name}}` marker and fail on anything left over.
fn substitute(template: &str, substitutions: &[(&str, String)]) -> Result<String> {
    let mut out = template.to_string();
    for (name, value) in substitutions {
        out = out.replace(&format!("{{{{{}}}}}", name), value);
    }
    if let Some(start) = out.find("{{") {
        let rest = &out[start + 2..];
        let name = rest
            .split("}}")
            .next()
            .unwrap_or(rest)
            .chars()
            .take(64)
            .collect::<String>();
        return Err(Error::UnresolvedPlaceholder(name));
    }
    Ok(out)
}

fn indent(fragment: &str, prefix: &str) -> String {
    fragment
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line.trim_end())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shifted coordinate expression for a pull-stream read: direction `c`
/// gathers from `cell - c`.
fn pull_coord(base: &str, c: i32) -> String {
    match c {
        0 => base.to_string(),
        1 => format!("{} - 1", base),
        -1 => format!("{} + 1", base),
        _ => unreachable!("velocity components are in {{-1, 0, 1}}"),
    }
}

/// `let f_i = <buffer>[i * volume + cell_index(x - c_x, y - c_y, z - c_z)];`
/// for every direction.
fn emit_streaming_gather<D: Descriptor>(buffer: &str) -> String {
    let mut out = String::new();
    for (i, c) in D::VELOCITIES.iter().enumerate() {
        out.push_str(&format!(
            "    let f_{i} = {buffer}[{i}u * params.volume + cell_index({}, {}, {})];\n",
            pull_coord("x", c[0]),
            pull_coord("y", c[1]),
            pull_coord("z", c[2]),
        ));
    }
    out
}

/// `let f_i = <buffer>[i * volume + gid];` for every direction.
fn emit_local_gather<D: Descriptor>(buffer: &str) -> String {
    let mut out = String::new();
    for i in 0..D::Q {
        out.push_str(&format!(
            "    let f_{i} = {buffer}[{i}u * params.volume + gid];\n"
        ));
    }
    out
}

/// Signed sum of `f_i` terms weighted by one velocity component.
fn signed_population_sum<D: Descriptor>(axis: usize) -> String {
    let mut terms = String::new();
    for (i, c) in D::VELOCITIES.iter().enumerate() {
        match c[axis] {
            1 => {
                if !terms.is_empty() {
                    terms.push_str(" + ");
                }
                terms.push_str(&format!("f_{}", i));
            }
            -1 => {
                if terms.is_empty() {
                    terms.push_str(&format!("-f_{}", i));
                } else {
                    terms.push_str(&format!(" - f_{}", i));
                }
            }
            _ => {}
        }
    }
    terms
}

/// Density and velocity from the gathered populations, as mutable `var`s so
/// the boundary fragment may override them.
fn emit_moments<D: Descriptor>() -> String {
    let mut out = String::new();
    let density = (0..D::Q)
        .map(|i| format!("f_{}", i))
        .collect::<Vec<_>>()
        .join(" + ");
    out.push_str(&format!("    var rho = {};\n", density));
    for axis in 0..D::DIM {
        out.push_str(&format!(
            "    var u_{axis} = ({}) / rho;\n",
            signed_population_sum::<D>(axis)
        ));
    }
    out
}

/// `dot(c_i, u)` expression, omitting zero components.
fn velocity_dot<D: Descriptor>(i: usize) -> String {
    let mut expr = String::new();
    for (axis, &comp) in D::VELOCITIES[i].iter().take(D::DIM).enumerate() {
        match comp {
            1 => {
                if !expr.is_empty() {
                    expr.push_str(" + ");
                }
                expr.push_str(&format!("u_{}", axis));
            }
            -1 => {
                if expr.is_empty() {
                    expr.push_str(&format!("-u_{}", axis));
                } else {
                    expr.push_str(&format!(" - u_{}", axis));
                }
            }
            _ => {}
        }
    }
    expr
}

/// BGK relaxation toward equilibrium plus the write into the next buffer.
fn emit_collide<D: Descriptor>() -> String {
    let mut out = String::new();
    let speed = (0..D::DIM)
        .map(|axis| format!("u_{axis} * u_{axis}"))
        .collect::<Vec<_>>()
        .join(" + ");
    out.push_str(&format!("    let usqr = 1.5 * ({});\n", speed));
    for i in 0..D::Q {
        let w = D::WEIGHTS_WGSL[i];
        let dot = velocity_dot::<D>(i);
        if dot.is_empty() {
            // Rest direction: c = 0.
            out.push_str(&format!(
                "    let feq_{i} = {w} * rho * (1.0 - usqr);\n"
            ));
        } else {
            out.push_str(&format!("    let cu_{i} = {};\n", dot));
            out.push_str(&format!(
                "    let feq_{i} = {w} * rho * (1.0 + 3.0 * cu_{i} + 4.5 * cu_{i} * cu_{i} - usqr);\n"
            ));
        }
        out.push_str(&format!(
            "    f_next[{i}u * params.volume + gid] = f_{i} - params.omega * (f_{i} - feq_{i});\n"
        ));
    }
    out
}

fn emit_moments_store<D: Descriptor>() -> String {
    if D::DIM == 3 {
        "vec4<f32>(rho, u_0, u_1, u_2)".to_string()
    } else {
        "vec4<f32>(rho, u_0, u_1, 0.0)".to_string()
    }
}
