//! JavaScript runtime support and the HTML harness.
//!
//! The runtime is assembled from fragments. Sprite objects get their methods
//! from method groups, and every motion method finishes with `afterMove()`,
//! whose body is the list of registered post-move hooks. Pen support adds a
//! runtime fragment, a method group and the `updatePenDrawing` hook.

/// Stage size in pixels; the origin is the centre.
pub const STAGE_WIDTH: u32 = 480;
pub const STAGE_HEIGHT: u32 = 360;

const RUNTIME_CORE: &str = r##"const scratchRuntime = (() => {
    const runtime = {
        variables: {},
        lists: {},
        procedures: {},
        sprites: [],
        answer: "",
        mouseX: 0,
        mouseY: 0,
        keysDown: new Set(),
        timerStart: Date.now(),
        frameDelay: __FRAME_DELAY__,
        flagHandlers: [],
        keyHandlers: [],
        clickHandlers: [],
        messageHandlers: {},
        started: false,
    };

    runtime.sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));

    runtime.log = (text) => {
        const panel = document.getElementById("console");
        if (panel) {
            const line = document.createElement("div");
            line.textContent = String(text);
            panel.appendChild(line);
            panel.scrollTop = panel.scrollHeight;
        }
        console.log(text);
    };

    runtime.timer = () => (Date.now() - runtime.timerStart) / 1000;
    runtime.resetTimer = () => {
        runtime.timerStart = Date.now();
    };

    runtime.random = (from, to) => {
        const low = Math.min(Number(from), Number(to));
        const high = Math.max(Number(from), Number(to));
        if (Number.isInteger(low) && Number.isInteger(high)) {
            return low + Math.floor(Math.random() * (high - low + 1));
        }
        return low + Math.random() * (high - low);
    };

    runtime.wrapDirection = (degrees) => {
        let d = ((Number(degrees) + 180) % 360 + 360) % 360 - 180;
        return d === -180 ? 180 : d;
    };

    runtime.normalizeKey = (key) => {
        const names = { " ": "space", Enter: "enter", ArrowUp: "up arrow", ArrowDown: "down arrow", ArrowLeft: "left arrow", ArrowRight: "right arrow" };
        return names[key] || String(key).toLowerCase();
    };

    runtime.keyPressed = (key) => {
        const wanted = String(key).toLowerCase();
        return wanted === "any" ? runtime.keysDown.size > 0 : runtime.keysDown.has(wanted);
    };

    runtime.ask = (sprite, question) => new Promise((resolve) => {
        if (sprite && !sprite.isStage) {
            sprite.say(question);
        }
        const stage = document.getElementById("stage");
        const form = document.createElement("form");
        form.className = "ask";
        const label = document.createElement("label");
        label.textContent = sprite && sprite.isStage ? String(question) : "";
        const input = document.createElement("input");
        input.type = "text";
        form.appendChild(label);
        form.appendChild(input);
        form.addEventListener("submit", (event) => {
            event.preventDefault();
            runtime.answer = input.value;
            form.remove();
            if (sprite && !sprite.isStage) {
                sprite.say("");
            }
            resolve();
        });
        (stage || document.body).appendChild(form);
        input.focus();
    });

    runtime.onFlag = (sprite, handler) => {
        runtime.flagHandlers.push({ sprite, handler });
    };
    runtime.onKey = (key, sprite, handler) => {
        runtime.keyHandlers.push({ key: String(key).toLowerCase(), sprite, handler });
    };
    runtime.onReceive = (message, sprite, handler) => {
        const key = String(message).toLowerCase();
        (runtime.messageHandlers[key] = runtime.messageHandlers[key] || []).push({ sprite, handler });
    };
    runtime.onClick = (sprite, handler) => {
        runtime.clickHandlers.push({ sprite, handler });
    };

    runtime.run = (sprite, handler) => Promise.resolve()
        .then(() => handler(sprite))
        .catch((error) => runtime.log(`error in ${sprite.name}: ${error && error.message ? error.message : error}`));

    runtime.broadcast = (message) => {
        const listeners = runtime.messageHandlers[String(message).toLowerCase()] || [];
        return Promise.all(listeners.map(({ sprite, handler }) => runtime.run(sprite, handler)));
    };

    runtime.greenFlag = () => {
        runtime.resetTimer();
        return Promise.all(runtime.flagHandlers.map(({ sprite, handler }) => runtime.run(sprite, handler)));
    };

    runtime.stage = () => runtime.sprites.find((sprite) => sprite.isStage);
    runtime.switchBackdrop = (name) => {
        const stage = runtime.stage();
        if (stage) {
            stage.switchCostume(name);
        }
    };
    runtime.nextBackdrop = () => {
        const stage = runtime.stage();
        if (stage) {
            stage.nextCostume();
        }
    };
    runtime.stopAllSounds = () => runtime.log("stop all sounds");
    runtime.setVariableVisible = (name, visible) => runtime.log(`${visible ? "show" : "hide"} variable ${name}: ${runtime.variables[name]}`);

__RUNTIME_EXTENSIONS__
    runtime.createSprite = (name, options) => {
        const sprite = createSprite(runtime, name, options || {});
        runtime.sprites.push(sprite);
        return sprite;
    };

    runtime.start = () => {
        if (runtime.started) {
            return runtime.greenFlag();
        }
        runtime.started = true;
        const stage = document.getElementById("stage");
        document.addEventListener("keydown", (event) => {
            const key = runtime.normalizeKey(event.key);
            runtime.keysDown.add(key);
            runtime.keyHandlers
                .filter((entry) => entry.key === key || entry.key === "any")
                .forEach(({ sprite, handler }) => runtime.run(sprite, handler));
        });
        document.addEventListener("keyup", (event) => {
            runtime.keysDown.delete(runtime.normalizeKey(event.key));
        });
        if (stage) {
            stage.addEventListener("mousemove", (event) => {
                const rect = stage.getBoundingClientRect();
                runtime.mouseX = Math.round(event.clientX - rect.left - __HALF_WIDTH__);
                runtime.mouseY = Math.round(__HALF_HEIGHT__ - (event.clientY - rect.top));
            });
        }
        const flag = document.getElementById("green-flag");
        if (flag) {
            flag.addEventListener("click", () => runtime.greenFlag());
        }
        return runtime.greenFlag();
    };

    return runtime;
})();
"##;

const SPRITE_FACTORY_HEAD: &str = r##"function createSprite(runtime, name, options) {
    const stage = document.getElementById("stage");
    const element = document.createElement("div");
    element.className = options.isStage ? "backdrop" : "sprite";
    const bubble = document.createElement("div");
    bubble.className = "bubble";
    element.appendChild(bubble);
    if (stage) {
        stage.appendChild(element);
    }
    const sprite = {
        name,
        isStage: Boolean(options.isStage),
        costumes: options.costumes || [],
        sounds: options.sounds || [],
        costumeIndex: 0,
        x: 0,
        y: 0,
        direction: 90,
        size: 100,
        visible: true,
        element,
        bubble,

        costumeName() {
            return this.costumes[this.costumeIndex] || this.name;
        },

        render() {
            if (this.isStage) {
                this.element.dataset.backdrop = this.costumeName();
                return;
            }
            this.element.style.display = this.visible ? "block" : "none";
            this.element.style.left = `${__HALF_WIDTH__ + this.x}px`;
            this.element.style.top = `${__HALF_HEIGHT__ - this.y}px`;
            this.element.style.transform = `translate(-50%, -50%) rotate(${this.direction - 90}deg) scale(${this.size / 100})`;
            this.element.dataset.costume = this.costumeName();
        },

        afterMove() {
__POST_MOVE_HOOKS__
        },
"##;

const SPRITE_FACTORY_TAIL: &str = r##"    };
    element.addEventListener("click", () => {
        runtime.clickHandlers
            .filter((entry) => entry.sprite === sprite)
            .forEach(({ handler }) => runtime.run(sprite, handler));
    });
    sprite.render();
    return sprite;
}
"##;

const MOTION_METHODS: &str = r##"        move(steps) {
            const radians = (90 - this.direction) * Math.PI / 180;
            this.x += Number(steps) * Math.cos(radians);
            this.y += Number(steps) * Math.sin(radians);
            this.afterMove();
        },

        turnRight(degrees) {
            this.direction = runtime.wrapDirection(this.direction + Number(degrees));
            this.render();
        },

        turnLeft(degrees) {
            this.turnRight(-Number(degrees));
        },

        pointInDirection(degrees) {
            this.direction = runtime.wrapDirection(degrees);
            this.render();
        },

        goTo(x, y) {
            this.x = Number(x);
            this.y = Number(y);
            this.afterMove();
        },

        async glideTo(seconds, x, y) {
            const startX = this.x;
            const startY = this.y;
            const frames = Math.max(1, Math.round(Number(seconds) * 1000 / runtime.frameDelay));
            for (let frame = 1; frame <= frames; frame++) {
                this.x = startX + (Number(x) - startX) * frame / frames;
                this.y = startY + (Number(y) - startY) * frame / frames;
                this.afterMove();
                await runtime.sleep(runtime.frameDelay);
            }
        },

        changeX(dx) {
            this.x += Number(dx);
            this.afterMove();
        },

        setX(x) {
            this.x = Number(x);
            this.afterMove();
        },

        changeY(dy) {
            this.y += Number(dy);
            this.afterMove();
        },

        setY(y) {
            this.y = Number(y);
            this.afterMove();
        },

        bounceOnEdge() {
            const halfWidth = __HALF_WIDTH__;
            const halfHeight = __HALF_HEIGHT__;
            if (Math.abs(this.x) > halfWidth) {
                this.x = Math.sign(this.x) * halfWidth;
                this.direction = runtime.wrapDirection(-this.direction);
            }
            if (Math.abs(this.y) > halfHeight) {
                this.y = Math.sign(this.y) * halfHeight;
                this.direction = runtime.wrapDirection(180 - this.direction);
            }
            this.afterMove();
        },
"##;

const LOOKS_METHODS: &str = r##"        say(text) {
            const value = String(text);
            this.bubble.textContent = value;
            this.bubble.className = "bubble say";
            this.bubble.style.display = value === "" ? "none" : "block";
            if (this.isStage && value !== "") {
                runtime.log(value);
            }
        },

        async sayFor(text, seconds) {
            this.say(text);
            await runtime.sleep(Number(seconds) * 1000);
            this.say("");
        },

        think(text) {
            this.say(text);
            this.bubble.className = "bubble think";
        },

        async thinkFor(text, seconds) {
            this.think(text);
            await runtime.sleep(Number(seconds) * 1000);
            this.say("");
        },

        show() {
            this.visible = true;
            this.render();
        },

        hide() {
            this.visible = false;
            this.render();
        },

        switchCostume(costume) {
            const byName = this.costumes.findIndex((name) => String(name).toLowerCase() === String(costume).toLowerCase());
            if (byName >= 0) {
                this.costumeIndex = byName;
            } else if (!Number.isNaN(Number(costume)) && this.costumes.length > 0) {
                const count = this.costumes.length;
                this.costumeIndex = ((Math.round(Number(costume)) - 1) % count + count) % count;
            }
            this.render();
        },

        nextCostume() {
            if (this.costumes.length > 0) {
                this.costumeIndex = (this.costumeIndex + 1) % this.costumes.length;
            }
            this.render();
        },

        setSize(size) {
            this.size = Math.max(0, Number(size));
            this.render();
        },

        changeSize(delta) {
            this.setSize(this.size + Number(delta));
        },
"##;

const SOUND_METHODS: &str = r##"        playSound(sound) {
            runtime.log(`${this.name} plays sound ${sound}`);
        },

        async playSoundUntilDone(sound) {
            this.playSound(sound);
            await runtime.sleep(runtime.frameDelay);
        },
"##;

const SENSING_METHODS: &str = r##"        bounds() {
            const radius = 24 * this.size / 100;
            return { left: this.x - radius, right: this.x + radius, bottom: this.y - radius, top: this.y + radius };
        },

        touching(target) {
            const wanted = String(target).toLowerCase();
            const box = this.bounds();
            if (wanted === "edge") {
                return box.left < -__HALF_WIDTH__ || box.right > __HALF_WIDTH__ || box.bottom < -__HALF_HEIGHT__ || box.top > __HALF_HEIGHT__;
            }
            if (wanted === "mouse-pointer") {
                return runtime.mouseX >= box.left && runtime.mouseX <= box.right && runtime.mouseY >= box.bottom && runtime.mouseY <= box.top;
            }
            const other = runtime.sprites.find((s) => !s.isStage && s !== this && s.name.toLowerCase() === wanted);
            if (!other || !other.visible || !this.visible) {
                return false;
            }
            const theirs = other.bounds();
            return box.left < theirs.right && box.right > theirs.left && box.bottom < theirs.top && box.top > theirs.bottom;
        },
"##;

const PEN_RUNTIME: &str = r##"    runtime.penCanvas = () => {
        if (!runtime.penContext) {
            const stage = document.getElementById("stage");
            const canvas = document.createElement("canvas");
            canvas.width = __STAGE_WIDTH__;
            canvas.height = __STAGE_HEIGHT__;
            canvas.className = "pen";
            if (stage) {
                stage.insertBefore(canvas, stage.firstChild);
            }
            runtime.penContext = canvas.getContext("2d");
        }
        return runtime.penContext;
    };
    runtime.penClear = () => {
        const context = runtime.penCanvas();
        if (context) {
            context.clearRect(0, 0, __STAGE_WIDTH__, __STAGE_HEIGHT__);
        }
    };
"##;

const PEN_METHODS: &str = r##"        penIsDown: false,
        penColor: "#4c97ff",
        penSize: 1,
        penFrom: null,

        penDown() {
            this.penIsDown = true;
            this.penFrom = { x: this.x, y: this.y };
            this.updatePenDrawing();
        },

        penUp() {
            this.penIsDown = false;
            this.penFrom = null;
        },

        penClear() {
            runtime.penClear();
        },

        stamp() {
            const context = runtime.penCanvas();
            if (context) {
                context.fillStyle = this.penColor;
                context.fillText(this.costumeName(), __HALF_WIDTH__ + this.x, __HALF_HEIGHT__ - this.y);
            }
        },

        setPenColor(color) {
            this.penColor = String(color);
        },

        setPenSize(size) {
            this.penSize = Math.max(1, Number(size));
        },

        changePenSize(delta) {
            this.setPenSize(this.penSize + Number(delta));
        },

        updatePenDrawing() {
            if (!this.penIsDown) {
                return;
            }
            const context = runtime.penCanvas();
            const from = this.penFrom || { x: this.x, y: this.y };
            if (context) {
                context.strokeStyle = this.penColor;
                context.lineWidth = this.penSize;
                context.lineCap = "round";
                context.beginPath();
                context.moveTo(__HALF_WIDTH__ + from.x, __HALF_HEIGHT__ - from.y);
                context.lineTo(__HALF_WIDTH__ + this.x, __HALF_HEIGHT__ - this.y);
                context.stroke();
            }
            this.penFrom = { x: this.x, y: this.y };
        },
"##;

const PAGE_STYLE: &str = r##"        body { font-family: sans-serif; margin: 16px; background: #f5f6fa; }
        #toolbar { margin-bottom: 8px; }
        #stage { position: relative; width: __STAGE_WIDTH__px; height: __STAGE_HEIGHT__px; background: #fff; border: 1px solid #ccc; overflow: hidden; }
        #stage canvas.pen { position: absolute; left: 0; top: 0; }
        .sprite { position: absolute; width: 48px; height: 48px; border-radius: 8px; background: #ffab19; }
        .sprite::after { content: attr(data-costume); position: absolute; top: 52px; left: 0; font-size: 10px; white-space: nowrap; }
        .bubble { display: none; position: absolute; bottom: 56px; left: 24px; padding: 4px 8px; background: #fff; border: 1px solid #999; border-radius: 12px; white-space: nowrap; }
        .bubble.think { border-style: dashed; }
        .ask { position: absolute; left: 8px; right: 8px; bottom: 8px; display: flex; gap: 8px; }
        .ask input { flex: 1; }
        #console { width: __STAGE_WIDTH__px; height: 120px; margin-top: 8px; padding: 4px; overflow-y: auto; font-family: monospace; font-size: 12px; background: #1e1e1e; color: #e0e0e0; }
"##;

/// Composes the runtime from fragments.
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    runtime_fragments: Vec<&'static str>,
    method_groups: Vec<&'static str>,
    post_move_hooks: Vec<&'static str>,
    pen: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            runtime_fragments: Vec::new(),
            method_groups: vec![MOTION_METHODS, LOOKS_METHODS, SOUND_METHODS, SENSING_METHODS],
            post_move_hooks: vec!["this.render();"],
            pen: false,
        }
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds pen support. Returns false when it was already enabled.
    pub fn enable_pen(&mut self) -> bool {
        if self.pen {
            return false;
        }
        self.pen = true;
        self.runtime_fragments.push(PEN_RUNTIME);
        self.method_groups.push(PEN_METHODS);
        self.post_move_hooks.insert(0, "this.updatePenDrawing();");
        true
    }

    pub fn has_pen(&self) -> bool {
        self.pen
    }

    pub fn post_move_hooks(&self) -> &[&'static str] {
        &self.post_move_hooks
    }

    pub fn render(&self, frame_delay_ms: u64) -> String {
        let hooks = self
            .post_move_hooks
            .iter()
            .map(|hook| format!("            {}", hook))
            .collect::<Vec<_>>()
            .join("\n");
        let mut factory = SPRITE_FACTORY_HEAD.replace("__POST_MOVE_HOOKS__", &hooks);
        for group in &self.method_groups {
            factory.push('\n');
            factory.push_str(group);
        }
        factory.push_str(SPRITE_FACTORY_TAIL);

        let core = RUNTIME_CORE
            .replace("__FRAME_DELAY__", &frame_delay_ms.to_string())
            .replace("__RUNTIME_EXTENSIONS__", &self.runtime_fragments.concat());
        fill_stage_size(&format!("{}\n{}", factory, core))
    }
}

/// Boot code appended after the user program.
pub fn boot_code(auto_start: bool) -> String {
    if auto_start {
        "window.addEventListener(\"load\", () => scratchRuntime.start());\n".to_string()
    } else {
        "window.addEventListener(\"load\", () => {\n    const flag = document.getElementById(\"green-flag\");\n    if (flag) {\n        flag.addEventListener(\"click\", () => scratchRuntime.start(), { once: true });\n    }\n});\n".to_string()
    }
}

/// A self-contained page with `#stage` and `#console` running `js`.
pub fn render_html(title: &str, js: &str) -> String {
    let style = fill_stage_size(PAGE_STYLE);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"utf-8\">\n    <title>{}</title>\n    <style>\n{}    </style>\n</head>\n<body>\n    <div id=\"toolbar\"><button id=\"green-flag\" type=\"button\">&#9873; Green flag</button></div>\n    <div id=\"stage\"></div>\n    <div id=\"console\"></div>\n    <script>\n{}    </script>\n</body>\n</html>\n",
        escape_html(title),
        style,
        escape_script(js)
    )
}

fn fill_stage_size(text: &str) -> String {
    text.replace("__STAGE_WIDTH__", &STAGE_WIDTH.to_string())
        .replace("__STAGE_HEIGHT__", &STAGE_HEIGHT.to_string())
        .replace("__HALF_WIDTH__", &(STAGE_WIDTH / 2).to_string())
        .replace("__HALF_HEIGHT__", &(STAGE_HEIGHT / 2).to_string())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keeps user text from closing the inline script element early.
fn escape_script(js: &str) -> String {
    js.replace("</script", "<\\/script")
        .replace("</SCRIPT", "<\\/SCRIPT")
        .replace("<!--", "<\\!--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_runtime_has_no_pen() {
        let js = RuntimeBuilder::new().render(16);
        assert!(js.contains("const scratchRuntime"));
        assert!(js.contains("frameDelay: 16"));
        assert!(js.contains("afterMove() {\n            this.render();\n        }"));
        assert!(!js.contains("updatePenDrawing"));
        assert!(!js.contains("__"), "unfilled placeholder left in runtime");
    }

    #[test]
    fn pen_adds_hook_and_methods_once() {
        let mut builder = RuntimeBuilder::new();
        assert!(!builder.has_pen());
        assert!(builder.enable_pen());
        assert!(!builder.enable_pen());
        assert!(builder.has_pen());
        assert_eq!(
            builder.post_move_hooks(),
            &["this.updatePenDrawing();", "this.render();"]
        );
        let js = builder.render(16);
        assert_eq!(js.matches("updatePenDrawing() {").count(), 1);
        assert!(js.contains("runtime.penCanvas = () =>"));
        assert!(js.contains("this.updatePenDrawing();\n            this.render();"));
    }

    #[test]
    fn html_embeds_script_safely() {
        let html = render_html("My <Game>", "say(\"</script>\");\n");
        assert!(html.contains("<title>My &lt;Game&gt;</title>"));
        assert!(html.contains("id=\"stage\""));
        assert!(html.contains("id=\"console\""));
        assert!(html.contains("<\\/script>"));
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(!html.contains("http://") && !html.contains("https://"));
    }

    #[test]
    fn boot_code_respects_auto_start() {
        assert!(boot_code(true).contains("scratchRuntime.start()"));
        assert!(boot_code(false).contains("once: true"));
    }
}
