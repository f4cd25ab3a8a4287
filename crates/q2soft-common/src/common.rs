// common.rs — console printing and error reporting

use crate::q_shared::{ERR_DROP, ERR_FATAL};

// ============================================================
// Com_Printf / Com_Error
// ============================================================

pub fn com_printf(msg: &str) {
    print!("{}", msg);
}

/// Format an engine error the way the console shows it.
pub fn error_text(code: i32, msg: &str) -> String {
    let msg = msg.trim_end();
    if code == ERR_FATAL {
        format!("Error: {}", msg)
    } else if code == ERR_DROP {
        format!("********************\nERROR: {}\n********************", msg)
    } else {
        format!("{}\n", msg)
    }
}

/// Report an engine error. Never unwinds: the caller decides whether to stop.
pub fn com_error(code: i32, msg: &str) {
    if code == ERR_FATAL || code == ERR_DROP {
        eprintln!("{}", error_text(code, msg));
    } else {
        com_printf(&error_text(code, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_by_level() {
        assert_eq!(error_text(ERR_FATAL, "R_RenderView: NULL worldmodel\n"), "Error: R_RenderView: NULL worldmodel");
        assert_eq!(
            error_text(ERR_DROP, "Mod_NumForName: NULL name"),
            "********************\nERROR: Mod_NumForName: NULL name\n********************"
        );
        assert_eq!(error_text(-1, "notice\n"), "notice\n");
    }
}
