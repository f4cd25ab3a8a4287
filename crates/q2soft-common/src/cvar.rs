// cvar.rs — console variable store
//
// The host owns one `CvarContext`; the refresh reaches it only through its
// import table.

use std::collections::HashMap;

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// The full cvar system context.
#[derive(Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    pub fn find_var_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        match self.cvar_index.get(name) {
            Some(&idx) => Some(&mut self.cvar_vars[idx]),
            None => None,
        }
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in. A freshly created cvar starts out modified.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            modified: true,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a cvar value, creating it if needed.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value, 0),
        };
        let var = &mut self.cvar_vars[idx];
        if value == var.string {
            return idx; // not changed
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
        idx
    }

    /// Set a cvar from a float value.
    pub fn set_value(&mut self, name: &str, value: f32) -> usize {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str)
    }

    pub fn is_modified(&self, name: &str) -> bool {
        self.find_var(name).is_some_and(|var| var.modified)
    }

    pub fn clear_modified(&mut self, name: &str) {
        if let Some(var) = self.find_var_mut(name) {
            var.modified = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_shared::CVAR_ARCHIVE;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "42", 0);
        assert_eq!(ctx.variable_value("test_var"), 42.0);
        assert_eq!(ctx.variable_value("missing"), 0.0);
    }

    #[test]
    fn test_cvar_get_existing_keeps_value() {
        let mut ctx = CvarContext::new();
        let a = ctx.get("sw_maxedges", "2048", 0);
        ctx.set("sw_maxedges", "4096");
        let b = ctx.get("sw_maxedges", "2048", CVAR_ARCHIVE);
        assert_eq!(a, b);
        assert_eq!(ctx.variable_value("sw_maxedges"), 4096.0);
        assert_eq!(ctx.find_var("sw_maxedges").map(|v| v.flags), Some(CVAR_ARCHIVE));
    }

    #[test]
    fn test_cvar_new_is_modified() {
        let mut ctx = CvarContext::new();
        ctx.get("vid_gamma", "1.0", CVAR_ARCHIVE);
        assert!(ctx.is_modified("vid_gamma"));
        ctx.clear_modified("vid_gamma");
        assert!(!ctx.is_modified("vid_gamma"));
    }

    #[test]
    fn test_cvar_set_same_value_not_modified() {
        let mut ctx = CvarContext::new();
        ctx.get("r_mode", "0", 0);
        ctx.clear_modified("r_mode");
        ctx.set_value("r_mode", 0.0);
        assert!(!ctx.is_modified("r_mode"));
        ctx.set_value("r_mode", 3.0);
        assert!(ctx.is_modified("r_mode"));
        assert_eq!(ctx.find_var("r_mode").map(|v| v.string.as_str()), Some("3"));
    }

    #[test]
    fn test_cvar_set_creates_missing() {
        let mut ctx = CvarContext::new();
        ctx.set("r_lightlevel", "150");
        assert_eq!(ctx.variable_value("r_lightlevel"), 150.0);
        assert!(ctx.is_modified("r_lightlevel"));
    }

    #[test]
    fn test_cvar_fractional_set_value() {
        let mut ctx = CvarContext::new();
        ctx.get("vid_gamma", "1", 0);
        ctx.set_value("vid_gamma", 0.5);
        assert_eq!(ctx.find_var("vid_gamma").map(|v| v.string.as_str()), Some("0.5"));
    }
}
