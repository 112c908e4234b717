//! Runtime support routines appended to every generated program.
//!
//! The helpers are leaf routines: arguments in `$a0`/`$a1`, result in `$v0`,
//! and only `$t`, `$a` and `$v` registers are touched, so callers never
//! need to save anything around them.

/// Concatenates two strings into a fresh heap buffer.
pub const STRCAT: &str = "_rt_strcat";
/// Byte-wise string equality, 1 or 0.
pub const STREQ: &str = "_rt_streq";
/// Copies a string into a fresh heap buffer.
pub const STRDUP: &str = "_rt_strdup";
/// Allocates an array with `$a0` elements, aborting on a non-positive count.
pub const NEWARRAY: &str = "_rt_newarray";
/// Prints `true` or `false`.
pub const PRINT_BOOL: &str = "_rt_print_bool";
/// Reads one line from input without its trailing newline.
pub const READLINE: &str = "_rt_readline";

/// Instructions for every helper routine.
pub fn text() -> String {
    let routines = [
        (
            STRCAT,
            r#"	move $t0, $a0
	move $t1, $a1
	li $t2, 0
	move $t3, $t0
_rt_strcat_len_left:
	lb $t4, 0($t3)
	beqz $t4, _rt_strcat_right
	addu $t2, $t2, 1
	addu $t3, $t3, 1
	b _rt_strcat_len_left
_rt_strcat_right:
	move $t3, $t1
_rt_strcat_len_right:
	lb $t4, 0($t3)
	beqz $t4, _rt_strcat_alloc
	addu $t2, $t2, 1
	addu $t3, $t3, 1
	b _rt_strcat_len_right
_rt_strcat_alloc:
	addu $a0, $t2, 1
	li $v0, 9
	syscall
	move $t3, $v0
_rt_strcat_copy_left:
	lb $t4, 0($t0)
	beqz $t4, _rt_strcat_copy_right
	sb $t4, 0($t3)
	addu $t0, $t0, 1
	addu $t3, $t3, 1
	b _rt_strcat_copy_left
_rt_strcat_copy_right:
	lb $t4, 0($t1)
	sb $t4, 0($t3)
	beqz $t4, _rt_strcat_done
	addu $t1, $t1, 1
	addu $t3, $t3, 1
	b _rt_strcat_copy_right
_rt_strcat_done:
	jr $ra
"#,
        ),
        (
            STREQ,
            r#"	lb $t0, 0($a0)
	lb $t1, 0($a1)
	bne $t0, $t1, _rt_streq_false
	beqz $t0, _rt_streq_true
	addu $a0, $a0, 1
	addu $a1, $a1, 1
	b _rt_streq
_rt_streq_true:
	li $v0, 1
	jr $ra
_rt_streq_false:
	li $v0, 0
	jr $ra
"#,
        ),
        (
            STRDUP,
            r#"	move $t0, $a0
	li $t2, 0
	move $t3, $t0
_rt_strdup_len:
	lb $t4, 0($t3)
	beqz $t4, _rt_strdup_alloc
	addu $t2, $t2, 1
	addu $t3, $t3, 1
	b _rt_strdup_len
_rt_strdup_alloc:
	addu $a0, $t2, 1
	li $v0, 9
	syscall
	move $t3, $v0
_rt_strdup_copy:
	lb $t4, 0($t0)
	sb $t4, 0($t3)
	beqz $t4, _rt_strdup_done
	addu $t0, $t0, 1
	addu $t3, $t3, 1
	b _rt_strdup_copy
_rt_strdup_done:
	jr $ra
"#,
        ),
        (
            NEWARRAY,
            r#"	blez $a0, _rt_newarray_bad
	move $t0, $a0
	mul $a0, $a0, 4
	addu $a0, $a0, 4
	li $v0, 9
	syscall
	sw $t0, 0($v0)
	jr $ra
_rt_newarray_bad:
	la $a0, _rt_msg_array_size
	li $v0, 4
	syscall
	li $v0, 10
	syscall
"#,
        ),
        (
            PRINT_BOOL,
            r#"	beqz $a0, _rt_print_bool_false
	la $a0, _rt_msg_true
	b _rt_print_bool_out
_rt_print_bool_false:
	la $a0, _rt_msg_false
_rt_print_bool_out:
	li $v0, 4
	syscall
	jr $ra
"#,
        ),
        (
            READLINE,
            r#"	li $a0, 256
	li $v0, 9
	syscall
	move $t0, $v0
	move $a0, $t0
	li $a1, 256
	li $v0, 8
	syscall
	move $t1, $t0
_rt_readline_scan:
	lb $t2, 0($t1)
	beqz $t2, _rt_readline_done
	li $t3, 10
	beq $t2, $t3, _rt_readline_strip
	addu $t1, $t1, 1
	b _rt_readline_scan
_rt_readline_strip:
	sb $zero, 0($t1)
_rt_readline_done:
	move $v0, $t0
	jr $ra
"#,
        ),
    ];

    let mut out = String::new();
    for (label, body) in routines {
        out.push_str(label);
        out.push_str(":\n");
        out.push_str(body);
    }
    out
}

/// Data used by the helper routines.
pub fn data() -> String {
    [
        "_rt_msg_true:\t.asciiz \"true\"",
        "_rt_msg_false:\t.asciiz \"false\"",
        "_rt_msg_array_size:\t.asciiz \"Error: array size must be positive\\n\"",
    ]
    .join("\n")
        + "\n"
}
