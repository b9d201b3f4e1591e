use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::{
    compile, intern, native, Error, NativeFun, ObjClosure, ObjUpvalue, OpCode, RuntimeError,
    StrId, Value, MAX_FRAMES, MAX_STACK,
};

/// The execution record of one active call: the closure being run, the
/// instruction pointer into its chunk, and the stack offset where its
/// slots begin. Slot zero holds the closure itself.
#[derive(Debug)]
struct CallFrame {
    closure: Rc<ObjClosure>,
    ip: usize,
    slots: usize,
}

/// A bytecode virtual machine for the Vesper programming language.
/// `print` output goes to the writer the machine was built with, so
/// tests can capture it; everything else about execution is unaffected
/// by the choice of sink.
#[derive(Debug)]
pub struct VM<W = io::Stdout> {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: HashMap<StrId, Value>,
    open_upvalues: Vec<Rc<RefCell<ObjUpvalue>>>,
    output: W,
}

impl Default for VM<io::Stdout> {
    fn default() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> VM<W> {
    /// Create a machine that writes `print` output to the given sink.
    /// The built-in natives are bound before any script runs.
    pub fn new(output: W) -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(MAX_STACK),
            frames: Vec::with_capacity(MAX_FRAMES),
            globals: HashMap::default(),
            open_upvalues: Vec::new(),
            output,
        };
        for (name, arity, call) in native::all() {
            let name = intern::sym(name);
            vm.globals
                .insert(name, Value::NativeFun(NativeFun { name, arity, call }));
        }
        vm
    }

    /// Tear the machine down and hand back its output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Compile and run the given source code. Globals and interned
    /// strings survive between calls, so a REPL can keep one machine.
    pub fn interpret(&mut self, src: &str) -> Result<(), Error> {
        let fun = compile(src).ok_or(Error::Compile)?;
        let closure = Rc::new(ObjClosure {
            fun: Rc::new(fun),
            upvalues: Vec::new(),
        });
        match self.execute(closure) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.report(&err);
                Err(Error::Runtime(err))
            }
        }
    }

    fn execute(&mut self, script: Rc<ObjClosure>) -> Result<(), RuntimeError> {
        self.push(Value::Closure(Rc::clone(&script)))?;
        self.call(script, 0)?;
        self.run()
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            #[cfg(feature = "trace")]
            self.trace();

            let byte = self.read_byte();
            let opcode = match OpCode::from_byte(byte) {
                Some(opcode) => opcode,
                None => unreachable!("the compiler only emits valid opcodes"),
            };
            match opcode {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let local = self.stack[self.frame().slots + slot].clone();
                    self.push(local)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0)?.clone();
                    let base = self.frame().slots;
                    self.stack[base + slot] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let value = match self.globals.get(&name) {
                        Some(value) => value.clone(),
                        None => {
                            return Err(RuntimeError::UndefinedVariable(intern::resolve(name)))
                        }
                    };
                    self.push(value)?;
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0)?.clone();
                    self.globals.insert(name, value);
                    self.pop()?;
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    if !self.globals.contains_key(&name) {
                        return Err(RuntimeError::UndefinedVariable(intern::resolve(name)));
                    }
                    let value = self.peek(0)?.clone();
                    self.globals.insert(name, value);
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let cell = Rc::clone(&self.frame().closure.upvalues[slot]);
                    let value = match &*cell.borrow() {
                        ObjUpvalue::Open(loc) => self.stack[*loc].clone(),
                        ObjUpvalue::Closed(value) => value.clone(),
                    };
                    self.push(value)?;
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0)?.clone();
                    let cell = Rc::clone(&self.frame().closure.upvalues[slot]);
                    let open_slot = match &mut *cell.borrow_mut() {
                        ObjUpvalue::Open(loc) => Some(*loc),
                        ObjUpvalue::Closed(closed) => {
                            *closed = value.clone();
                            None
                        }
                    };
                    if let Some(loc) = open_slot {
                        self.stack[loc] = value;
                    }
                }
                OpCode::Equal => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Bool(lhs == rhs))?;
                }
                OpCode::Greater => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(lhs.gt(&rhs)?)?;
                }
                OpCode::Less => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(lhs.lt(&rhs)?)?;
                }
                OpCode::Add => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push((&lhs + &rhs)?)?;
                }
                OpCode::Subtract => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push((&lhs - &rhs)?)?;
                }
                OpCode::Multiply => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push((&lhs * &rhs)?)?;
                }
                OpCode::Divide => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push((&lhs / &rhs)?)?;
                }
                OpCode::IntDivide => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(lhs.int_div(&rhs)?)?;
                }
                OpCode::Modulus => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(lhs.modulo(&rhs)?)?;
                }
                OpCode::Not => {
                    let value = self.pop()?;
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Negate => {
                    let value = self.pop()?;
                    self.push((-&value)?)?;
                }
                OpCode::Print => {
                    let value = self.pop()?;
                    writeln!(self.output, "{}", value).expect("the output sink accepts writes");
                }
                OpCode::Jump => {
                    let offset = self.read_short() as usize;
                    self.frame_mut().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short() as usize;
                    // the condition stays put, the compiler pops it on
                    // both branches
                    if self.peek(0)?.is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short() as usize;
                    self.frame_mut().ip -= offset;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    let callee = self.peek(argc as usize)?.clone();
                    self.call_value(callee, argc)?;
                }
                OpCode::Closure => {
                    let fun = match self.read_constant() {
                        Value::Fun(fun) => fun,
                        _ => unreachable!("the closure constant must be a function"),
                    };
                    let mut upvalues = Vec::with_capacity(fun.upvalue_count);
                    for _ in 0..fun.upvalue_count {
                        let is_local = self.read_byte() == 1;
                        let index = self.read_byte() as usize;
                        let upvalue = if is_local {
                            let slot = self.frame().slots + index;
                            self.capture_upvalue(slot)
                        } else {
                            Rc::clone(&self.frame().closure.upvalues[index])
                        };
                        upvalues.push(upvalue);
                    }
                    self.push(Value::Closure(Rc::new(ObjClosure { fun, upvalues })))?;
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop()?;
                }
                OpCode::Return => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().expect("a frame is active while running");
                    self.close_upvalues(frame.slots);
                    if self.frames.is_empty() {
                        // pop the script closure and finish
                        self.pop()?;
                        return Ok(());
                    }
                    self.stack.truncate(frame.slots);
                    self.push(result)?;
                }
            }
        }
    }

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), RuntimeError> {
        match callee {
            Value::Closure(closure) => self.call(closure, argc),
            Value::NativeFun(fun) => {
                if fun.arity != argc {
                    return Err(RuntimeError::ArityMismatch(fun.arity, argc));
                }
                let first_arg = self.stack.len() - argc as usize;
                let result = (fun.call)(&self.stack[first_arg..]);
                // drop the arguments and the callee below them
                self.stack.truncate(first_arg - 1);
                self.push(result)
            }
            _ => Err(RuntimeError::InvalidCall),
        }
    }

    fn call(&mut self, closure: Rc<ObjClosure>, argc: u8) -> Result<(), RuntimeError> {
        if argc != closure.fun.arity {
            return Err(RuntimeError::ArityMismatch(closure.fun.arity, argc));
        }
        if self.frames.len() == MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }
        let slots = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots,
        });
        Ok(())
    }

    /// Find the open upvalue for a stack slot, creating one if no
    /// closure has captured that slot yet. The open list is kept sorted
    /// with the topmost slot first so closing can stop early.
    fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<ObjUpvalue>> {
        let mut insert_at = self.open_upvalues.len();
        for (idx, upvalue) in self.open_upvalues.iter().enumerate() {
            let loc = match *upvalue.borrow() {
                ObjUpvalue::Open(loc) => loc,
                ObjUpvalue::Closed(_) => {
                    unreachable!("the open-upvalue list holds open upvalues only")
                }
            };
            if loc == slot {
                return Rc::clone(upvalue);
            }
            if loc < slot {
                insert_at = idx;
                break;
            }
        }
        let upvalue = Rc::new(RefCell::new(ObjUpvalue::Open(slot)));
        self.open_upvalues.insert(insert_at, Rc::clone(&upvalue));
        upvalue
    }

    /// Close every open upvalue at or above the cutoff slot, moving the
    /// captured values onto the heap.
    fn close_upvalues(&mut self, cutoff: usize) {
        loop {
            let loc = match self.open_upvalues.first() {
                Some(upvalue) => match *upvalue.borrow() {
                    ObjUpvalue::Open(loc) => loc,
                    ObjUpvalue::Closed(_) => {
                        unreachable!("the open-upvalue list holds open upvalues only")
                    }
                },
                None => break,
            };
            if loc < cutoff {
                break;
            }
            let upvalue = self.open_upvalues.remove(0);
            *upvalue.borrow_mut() = ObjUpvalue::Closed(self.stack[loc].clone());
        }
    }

    /// Print the message and a stack trace to stderr, then reset the
    /// machine so the next `interpret` starts clean.
    fn report(&mut self, err: &RuntimeError) {
        eprintln!("{}", err);
        for frame in self.frames.iter().rev() {
            let fun = &frame.closure.fun;
            let line = fun.chunk.line(frame.ip.saturating_sub(1));
            let name = intern::resolve(fun.name);
            if name.is_empty() {
                eprintln!("[line {}] in script", line);
            } else {
                eprintln!("[line {}] in {}()", line, name);
            }
        }
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("a frame is active while running")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames
            .last_mut()
            .expect("a frame is active while running")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self
            .frames
            .last_mut()
            .expect("a frame is active while running");
        let byte = frame.closure.fun.chunk.byte(frame.ip);
        frame.ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        u16::from_be_bytes([hi, lo])
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        self.frame().closure.fun.chunk.constant(idx).clone()
    }

    fn read_string(&mut self) -> StrId {
        match self.read_constant() {
            Value::Str(id) => id,
            _ => unreachable!("the constant for a variable name must be a string"),
        }
    }

    fn peek(&self, steps: usize) -> Result<&Value, RuntimeError> {
        self.stack
            .len()
            .checked_sub(1 + steps)
            .and_then(|idx| self.stack.get(idx))
            .ok_or(RuntimeError::StackUnderflow)
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == MAX_STACK {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    #[cfg(feature = "trace")]
    fn trace(&self) {
        print!("          ");
        for value in &self.stack {
            print!("[ {} ]", value);
        }
        println!();
        let frame = self.frame();
        let _ = frame
            .closure
            .fun
            .chunk
            .disassemble_at(frame.ip, &mut io::stdout());
    }
}
